//! Pure calculation functions for crop and downscale geometry.
//!
//! All functions here are pure and testable without any I/O or pixels.

/// A square region inside a source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SquareCrop {
    pub x: u32,
    pub y: u32,
    pub side: u32,
}

/// Largest centered square that fits inside `(width, height)`.
///
/// Offsets use truncating division, so an odd leftover pixel is dropped from
/// the right/bottom edge.
///
/// # Examples
/// ```
/// # use avatar_resizer::imaging::calculate_center_crop;
/// let crop = calculate_center_crop((512, 256));
/// assert_eq!((crop.x, crop.y, crop.side), (128, 0, 256));
/// ```
pub fn calculate_center_crop(dims: (u32, u32)) -> SquareCrop {
    let (width, height) = dims;
    let side = width.min(height);
    SquareCrop {
        x: (width - side) / 2,
        y: (height - side) / 2,
        side,
    }
}

/// Intermediate sizes of the progressive halving pass.
///
/// Starting from `current`, both edges are halved (integer division) for as
/// long as the halved size still covers `target` on both axes. Each entry is
/// one bilinear resample. An empty plan means the source is already smaller
/// than twice the target and only the final resize runs.
///
/// # Examples
/// ```
/// # use avatar_resizer::imaging::plan_halving;
/// // 1024 → 512 → 256 → 128, final resize is then 128 → 128
/// assert_eq!(plan_halving((1024, 1024), (128, 128)), vec![(512, 512), (256, 256), (128, 128)]);
/// assert!(plan_halving((255, 255), (128, 128)).is_empty());
/// ```
pub fn plan_halving(current: (u32, u32), target: (u32, u32)) -> Vec<(u32, u32)> {
    let (mut w, mut h) = current;
    let (tw, th) = target;
    let mut steps = Vec::new();

    while w / 2 >= tw && h / 2 >= th {
        w /= 2;
        h /= 2;
        steps.push((w, h));
    }

    steps
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // calculate_center_crop tests
    // =========================================================================

    #[test]
    fn crop_landscape_centers_horizontally() {
        assert_eq!(
            calculate_center_crop((512, 256)),
            SquareCrop {
                x: 128,
                y: 0,
                side: 256
            }
        );
    }

    #[test]
    fn crop_portrait_centers_vertically() {
        assert_eq!(
            calculate_center_crop((300, 500)),
            SquareCrop {
                x: 0,
                y: 100,
                side: 300
            }
        );
    }

    #[test]
    fn crop_square_is_whole_image() {
        assert_eq!(
            calculate_center_crop((640, 640)),
            SquareCrop {
                x: 0,
                y: 0,
                side: 640
            }
        );
    }

    #[test]
    fn crop_odd_leftover_truncates() {
        // 101 - 100 = 1 spare column → offset 0
        let crop = calculate_center_crop((101, 100));
        assert_eq!((crop.x, crop.y, crop.side), (0, 0, 100));
        let crop = calculate_center_crop((103, 100));
        assert_eq!((crop.x, crop.y, crop.side), (1, 0, 100));
    }

    #[test]
    fn crop_side_is_always_min_edge() {
        for (w, h) in [(1, 1), (1, 900), (900, 1), (37, 64), (2048, 1536)] {
            let crop = calculate_center_crop((w, h));
            assert_eq!(crop.side, w.min(h));
            assert!(crop.x + crop.side <= w);
            assert!(crop.y + crop.side <= h);
        }
    }

    // =========================================================================
    // plan_halving tests
    // =========================================================================

    #[test]
    fn halving_power_of_two_lands_on_target() {
        assert_eq!(
            plan_halving((1024, 1024), (128, 128)),
            vec![(512, 512), (256, 256), (128, 128)]
        );
    }

    #[test]
    fn halving_stops_above_target() {
        // 1000 → 500 → 250; 125 would undershoot 128
        assert_eq!(plan_halving((1000, 1000), (128, 128)), vec![(500, 500), (250, 250)]);
    }

    #[test]
    fn halving_skipped_below_twice_target() {
        for side in [1, 64, 128, 200, 255] {
            assert!(plan_halving((side, side), (128, 128)).is_empty());
        }
    }

    #[test]
    fn halving_runs_at_exactly_twice_target() {
        assert_eq!(plan_halving((256, 256), (128, 128)), vec![(128, 128)]);
    }

    #[test]
    fn halving_requires_both_axes() {
        // Width could halve, height can't
        assert!(plan_halving((1024, 200), (128, 128)).is_empty());
    }

    #[test]
    fn halving_non_square_target() {
        assert_eq!(plan_halving((800, 800), (100, 300)), vec![(400, 400)]);
    }
}
