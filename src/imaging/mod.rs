//! Image processing in pure Rust, no system libraries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** (JPEG, PNG, GIF, BMP, TIFF, WebP) | `image::load_from_memory` → RGBA8 |
//! | **Center crop** | `image::imageops::crop_imm` |
//! | **Halving steps** | `image::imageops::resize` with `Triangle` (bilinear) |
//! | **Final resize** | `image::imageops::resize` with `CatmullRom` (bicubic) |
//! | **Encode** | `image::codecs::png::PngEncoder` (RGBA) |
//!
//! The module is split into:
//! - **Buffer**: the immutable [`ImageBuffer`] value type
//! - **Calculations**: Pure functions for crop and halving geometry (unit testable)
//! - **Parameters**: Target size and filter selection
//! - **Resize**: The crop → halve → final pipeline

pub mod buffer;
mod calculations;
mod params;
pub mod resize;

pub use buffer::{BufferError, ImageBuffer};
pub use calculations::{SquareCrop, calculate_center_crop, plan_halving};
pub use params::{DEFAULT_AVATAR_SIZE, InvalidSize, Resample, ThumbnailSize};
pub use resize::{ResizeTrace, center_crop, resize, resize_traced};
