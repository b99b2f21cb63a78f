//! Immutable in-memory raster image.
//!
//! [`ImageBuffer`] is the value type that flows between every stage: the
//! fetcher produces one, the resizer turns one into another, the job store
//! holds one per completed job. Pixels live behind an [`Arc`], so cloning a
//! buffer is a reference-count bump and finished results can be handed to any
//! number of readers without copying or locking.
//!
//! There is no `&mut` access to the pixel data. Every transform builds a new
//! buffer.

use image::codecs::png::PngEncoder;
use image::{DynamicImage, ExtendedColorType, ImageEncoder, RgbaImage};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BufferError {
    #[error("Image dimensions must be non-zero (got {width}x{height})")]
    EmptyDimensions { width: u32, height: u32 },
    #[error("Pixel data length {actual} does not match {width}x{height} RGBA ({expected} bytes)")]
    LengthMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    #[error("Failed to decode image: {0}")]
    Decode(String),
    #[error("PNG encode failed: {0}")]
    Encode(String),
}

/// Decoded RGBA8 pixel grid, row-major, immutable once built.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageBuffer {
    pixels: Arc<RgbaImage>,
}

impl ImageBuffer {
    /// Build from raw row-major RGBA bytes.
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, BufferError> {
        if width == 0 || height == 0 {
            return Err(BufferError::EmptyDimensions { width, height });
        }
        let expected = width as usize * height as usize * 4;
        let actual = pixels.len();
        let mismatch = BufferError::LengthMismatch {
            width,
            height,
            expected,
            actual,
        };
        if actual != expected {
            return Err(mismatch);
        }
        let img = RgbaImage::from_raw(width, height, pixels).ok_or(mismatch)?;
        Ok(Self::from_image(img))
    }

    /// Build a buffer by evaluating `f` for every pixel.
    pub fn from_fn(
        width: u32,
        height: u32,
        mut f: impl FnMut(u32, u32) -> [u8; 4],
    ) -> Result<Self, BufferError> {
        if width == 0 || height == 0 {
            return Err(BufferError::EmptyDimensions { width, height });
        }
        let img = RgbaImage::from_fn(width, height, |x, y| image::Rgba(f(x, y)));
        Ok(Self::from_image(img))
    }

    /// Decode encoded bytes (format is sniffed), converting to RGBA.
    ///
    /// Sources without an alpha channel get a fully opaque one.
    pub fn decode(bytes: &[u8]) -> Result<Self, BufferError> {
        let decoded = image::load_from_memory(bytes).map_err(|e| BufferError::Decode(e.to_string()))?;
        if decoded.width() == 0 || decoded.height() == 0 {
            return Err(BufferError::Decode("image has no pixels".into()));
        }
        Ok(decoded.into())
    }

    pub(crate) fn from_image(img: RgbaImage) -> Self {
        Self {
            pixels: Arc::new(img),
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    /// Raw RGBA bytes, row-major, `width * height * 4` long.
    pub fn pixels(&self) -> &[u8] {
        self.pixels.as_raw()
    }

    /// RGBA value at `(x, y)`. Panics when out of bounds, like slice indexing.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.pixels.get_pixel(x, y).0
    }

    pub(crate) fn as_rgba(&self) -> &RgbaImage {
        &self.pixels
    }

    /// True when both buffers share the same pixel allocation.
    pub fn shares_pixels_with(&self, other: &ImageBuffer) -> bool {
        Arc::ptr_eq(&self.pixels, &other.pixels)
    }

    /// Encode as PNG with an alpha channel.
    pub fn to_png(&self) -> Result<Vec<u8>, BufferError> {
        let mut out = Vec::new();
        PngEncoder::new(&mut out)
            .write_image(
                self.pixels(),
                self.width(),
                self.height(),
                ExtendedColorType::Rgba8,
            )
            .map_err(|e| BufferError::Encode(e.to_string()))?;
        Ok(out)
    }
}

impl From<DynamicImage> for ImageBuffer {
    fn from(img: DynamicImage) -> Self {
        Self::from_image(img.into_rgba8())
    }
}

impl fmt::Debug for ImageBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageBuffer")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish_non_exhaustive()
    }
}
