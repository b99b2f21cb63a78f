//! Square avatar resizing: center crop, progressive halving, final bicubic pass.
//!
//! ```text
//! 512x256 ──crop──▶ 256x256 ──halve (bilinear)──▶ 128x128 ──final (bicubic)──▶ 128x128
//! ```
//!
//! A single large downscale aliases badly, so the image is first halved with a
//! bilinear filter until one more halving would undershoot the target. Only the
//! last step, which covers at most a 2x reduction (or an upscale for small
//! sources), uses the more expensive bicubic filter. The final step always runs,
//! even when the working buffer already has the target size.

use super::buffer::ImageBuffer;
use super::calculations::{calculate_center_crop, plan_halving};
use super::params::{Resample, ThumbnailSize};
use image::imageops;

/// Record of the resampling steps one [`resize_traced`] call performed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResizeTrace {
    /// Size after the center crop.
    pub cropped: (u32, u32),
    /// Every resample in order, with the filter used.
    pub steps: Vec<((u32, u32), Resample)>,
}

impl ResizeTrace {
    pub fn halvings(&self) -> usize {
        self.steps
            .iter()
            .filter(|(_, r)| *r == Resample::Bilinear)
            .count()
    }

    pub fn final_resizes(&self) -> usize {
        self.steps
            .iter()
            .filter(|(_, r)| *r == Resample::Bicubic)
            .count()
    }
}

/// Largest centered square of `src`.
///
/// Already-square input is returned as-is (same pixel allocation).
pub fn center_crop(src: &ImageBuffer) -> ImageBuffer {
    let crop = calculate_center_crop(src.dimensions());
    if (crop.side, crop.side) == src.dimensions() {
        return src.clone();
    }
    let view = imageops::crop_imm(src.as_rgba(), crop.x, crop.y, crop.side, crop.side);
    ImageBuffer::from_image(view.to_image())
}

/// Normalize `src` into exactly `size`.
pub fn resize(src: &ImageBuffer, size: ThumbnailSize) -> ImageBuffer {
    resize_traced(src, size).0
}

/// [`resize`] plus a trace of the steps taken.
pub fn resize_traced(src: &ImageBuffer, size: ThumbnailSize) -> (ImageBuffer, ResizeTrace) {
    let cropped = center_crop(src);
    let mut trace = ResizeTrace {
        cropped: cropped.dimensions(),
        steps: Vec::new(),
    };

    let mut working = cropped;
    for (w, h) in plan_halving(working.dimensions(), size.as_tuple()) {
        working = resample(&working, (w, h), Resample::Bilinear);
        trace.steps.push(((w, h), Resample::Bilinear));
    }

    let out = resample(&working, size.as_tuple(), Resample::Bicubic);
    trace.steps.push((size.as_tuple(), Resample::Bicubic));

    (out, trace)
}

fn resample(src: &ImageBuffer, (width, height): (u32, u32), method: Resample) -> ImageBuffer {
    ImageBuffer::from_image(imageops::resize(
        src.as_rgba(),
        width,
        height,
        method.filter(),
    ))
}
