//! Parameter types for image operations.
//!
//! - [`ThumbnailSize`]: Target dimensions, guaranteed non-zero on construction.
//! - [`Resample`]: Which interpolation a resampling step uses.

use image::imageops::FilterType;
use thiserror::Error;

/// Edge used for avatars when nothing else is configured.
pub const DEFAULT_AVATAR_SIZE: u32 = 128;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Thumbnail dimensions must be non-zero (got {width}x{height})")]
pub struct InvalidSize {
    pub width: u32,
    pub height: u32,
}

/// Target output dimensions for the resizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThumbnailSize {
    width: u32,
    height: u32,
}

impl ThumbnailSize {
    pub fn new(width: u32, height: u32) -> Result<Self, InvalidSize> {
        if width == 0 || height == 0 {
            return Err(InvalidSize { width, height });
        }
        Ok(Self { width, height })
    }

    /// Square target with the given edge.
    pub fn square(side: u32) -> Result<Self, InvalidSize> {
        Self::new(side, side)
    }

    pub fn width(self) -> u32 {
        self.width
    }

    pub fn height(self) -> u32 {
        self.height
    }

    pub fn as_tuple(self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl Default for ThumbnailSize {
    fn default() -> Self {
        Self {
            width: DEFAULT_AVATAR_SIZE,
            height: DEFAULT_AVATAR_SIZE,
        }
    }
}

/// Interpolation used by a resampling step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resample {
    /// Cheap, used for the repeated halving steps.
    Bilinear,
    /// Sharper, used once for the final resize.
    Bicubic,
}

impl Resample {
    pub fn filter(self) -> FilterType {
        match self {
            Resample::Bilinear => FilterType::Triangle,
            Resample::Bicubic => FilterType::CatmullRom,
        }
    }
}
