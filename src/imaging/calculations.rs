//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.
//! Upscaling is always allowed: a 100px source asked for 400px gets 400px.

/// Calculate the aspect-preserving size that fits inside the requested box.
///
/// Either bound may be absent. With both present the result touches one edge
/// of the box and stays inside the other; with neither, the source size is
/// returned unchanged.
///
/// # Examples
/// ```
/// # use image_resize_server::imaging::calculations::calculate_fit_dimensions;
/// // 800x600 into a 400x400 box → 400x300
/// assert_eq!(calculate_fit_dimensions((800, 600), Some(400), Some(400)), (400, 300));
///
/// // Only a height → width follows the aspect ratio
/// assert_eq!(calculate_fit_dimensions((800, 600), None, Some(300)), (400, 300));
/// ```
pub fn calculate_fit_dimensions(
    source: (u32, u32),
    width: Option<u32>,
    height: Option<u32>,
) -> (u32, u32) {
    let (src_w, src_h) = (source.0.max(1) as f64, source.1.max(1) as f64);

    let scale = match (width, height) {
        (Some(w), Some(h)) => (w as f64 / src_w).min(h as f64 / src_h),
        (Some(w), None) => w as f64 / src_w,
        (None, Some(h)) => h as f64 / src_h,
        (None, None) => return source,
    };

    // The bound that decided the scale is copied exactly to avoid 399.9999
    let out_w = match width {
        Some(w) if w as f64 / src_w == scale => w,
        _ => scaled(src_w, scale),
    };
    let out_h = match height {
        Some(h) if h as f64 / src_h == scale => h,
        _ => scaled(src_h, scale),
    };
    (out_w, out_h)
}

/// [`calculate_fit_dimensions`] with both output edges capped at `max_edge`.
///
/// An absent bound is treated as `max_edge`, so a width-only request on a
/// very tall source is limited by its height instead of growing without
/// bound. With neither bound the source size is returned unchanged.
///
/// # Examples
/// ```
/// # use image_resize_server::imaging::calculations::calculate_bounded_fit_dimensions;
/// // A 1x1000 strip asked for 8192 wide stays within 8192 tall
/// assert_eq!(calculate_bounded_fit_dimensions((1, 1000), Some(8192), None, 8192), (8, 8192));
/// ```
pub fn calculate_bounded_fit_dimensions(
    source: (u32, u32),
    width: Option<u32>,
    height: Option<u32>,
    max_edge: u32,
) -> (u32, u32) {
    if width.is_none() && height.is_none() {
        return source;
    }
    let max_edge = max_edge.max(1);
    let bound = |v: Option<u32>| Some(v.map_or(max_edge, |v| v.min(max_edge)));
    calculate_fit_dimensions(source, bound(width), bound(height))
}

/// Largest window of the target's aspect ratio that fits inside the source.
///
/// Cropping this window out of the source (centered) and scaling it to the
/// target is a fill-and-crop that never allocates more than the larger of
/// the source and the target.
///
/// # Arguments
/// * `source` - Original image dimensions (width, height)
/// * `target` - Target area dimensions (width, height)
pub fn calculate_crop_window(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = (source.0.max(1), source.1.max(1));
    let (tgt_w, tgt_h) = (target.0.max(1) as f64, target.1.max(1) as f64);

    let scale = (src_w as f64 / tgt_w).min(src_h as f64 / tgt_h);
    (
        ((tgt_w * scale).round() as u32).clamp(1, src_w),
        ((tgt_h * scale).round() as u32).clamp(1, src_h),
    )
}

/// Offset of a centered `inner` rectangle inside `outer`.
///
/// Used to place the crop window. `inner` must not exceed
/// `outer`; excess is clamped to zero offset.
pub fn calculate_center_offset(outer: (u32, u32), inner: (u32, u32)) -> (u32, u32) {
    (
        outer.0.saturating_sub(inner.0) / 2,
        outer.1.saturating_sub(inner.1) / 2,
    )
}

/// Top-left position that centers `item` on `canvas`.
///
/// Negative when the item is larger than the canvas; the overlay is clipped.
pub fn calculate_centered_origin(canvas: (u32, u32), item: (u32, u32)) -> (i64, i64) {
    (
        (i64::from(canvas.0) - i64::from(item.0)) / 2,
        (i64::from(canvas.1) - i64::from(item.1)) / 2,
    )
}

fn scaled(edge: f64, scale: f64) -> u32 {
    ((edge * scale).round() as u32).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // calculate_fit_dimensions tests
    // =========================================================================

    #[test]
    fn fit_landscape_into_square_box() {
        assert_eq!(
            calculate_fit_dimensions((800, 600), Some(400), Some(400)),
            (400, 300)
        );
    }

    #[test]
    fn fit_portrait_into_square_box() {
        assert_eq!(
            calculate_fit_dimensions((600, 800), Some(400), Some(400)),
            (300, 400)
        );
    }

    #[test]
    fn fit_width_only() {
        // 1500 * (1000/2000) = 750
        assert_eq!(
            calculate_fit_dimensions((2000, 1500), Some(1000), None),
            (1000, 750)
        );
    }

    #[test]
    fn fit_height_only() {
        assert_eq!(
            calculate_fit_dimensions((2000, 1500), None, Some(300)),
            (400, 300)
        );
    }

    #[test]
    fn fit_upscales() {
        assert_eq!(
            calculate_fit_dimensions((100, 50), Some(400), None),
            (400, 200)
        );
        assert_eq!(
            calculate_fit_dimensions((100, 100), Some(300), Some(200)),
            (200, 200)
        );
    }

    #[test]
    fn fit_without_bounds_keeps_source() {
        assert_eq!(calculate_fit_dimensions((123, 45), None, None), (123, 45));
    }

    #[test]
    fn fit_rounds_to_nearest_and_never_zero() {
        // 333 * (100/1000) = 33.3 → 33
        assert_eq!(
            calculate_fit_dimensions((1000, 333), Some(100), None),
            (100, 33)
        );
        // 1 * (10/10000) = 0.001 → clamped to 1
        assert_eq!(
            calculate_fit_dimensions((10000, 1), Some(10), None),
            (10, 1)
        );
    }

    #[test]
    fn fit_preserves_aspect_within_a_pixel() {
        let sources = [(1024, 768), (640, 480), (333, 777), (1, 1000), (4000, 3)];
        let boxes = [
            (Some(100), None),
            (None, Some(100)),
            (Some(250), Some(90)),
            (Some(17), Some(1000)),
        ];
        for src in sources {
            for (w, h) in boxes {
                let (out_w, out_h) = calculate_fit_dimensions(src, w, h);
                if let Some(w) = w {
                    assert!(out_w <= w, "{src:?} {w} → {out_w}");
                }
                if let Some(h) = h {
                    assert!(out_h <= h, "{src:?} {h} → {out_h}");
                }
                let (sw, sh) = (src.0 as f64, src.1 as f64);
                let h_err = (out_h as f64 - out_w as f64 * sh / sw).abs();
                let w_err = (out_w as f64 - out_h as f64 * sw / sh).abs();
                assert!(
                    h_err <= 1.0 || w_err <= 1.0,
                    "{src:?} → ({out_w}, {out_h})"
                );
            }
        }
    }

    // =========================================================================
    // calculate_bounded_fit_dimensions tests
    // =========================================================================

    #[test]
    fn bounded_fit_matches_plain_fit_for_ordinary_sources() {
        assert_eq!(
            calculate_bounded_fit_dimensions((2000, 1500), Some(1000), None, 8192),
            (1000, 750)
        );
        assert_eq!(
            calculate_bounded_fit_dimensions((800, 600), Some(400), Some(400), 8192),
            (400, 300)
        );
        assert_eq!(
            calculate_bounded_fit_dimensions((123, 45), None, None, 10),
            (123, 45)
        );
    }

    #[test]
    fn bounded_fit_caps_the_computed_edge() {
        // Plain fit would give 8192 x 8_192_000
        assert_eq!(
            calculate_fit_dimensions((1, 1000), Some(8192), None),
            (8192, 8_192_000)
        );
        assert_eq!(
            calculate_bounded_fit_dimensions((1, 1000), Some(8192), None, 8192),
            (8, 8192)
        );
        assert_eq!(
            calculate_bounded_fit_dimensions((1000, 1), None, Some(8192), 8192),
            (8192, 8)
        );
    }

    #[test]
    fn bounded_fit_never_exceeds_max_edge() {
        let sources = [(1, 1000), (1000, 1), (1, 1), (7000, 2), (640, 480)];
        let boxes = [
            (Some(5000), None),
            (None, Some(5000)),
            (Some(u32::MAX), Some(u32::MAX)),
            (Some(1), None),
        ];
        for src in sources {
            for (w, h) in boxes {
                let (out_w, out_h) = calculate_bounded_fit_dimensions(src, w, h, 4096);
                assert!(
                    (1..=4096).contains(&out_w) && (1..=4096).contains(&out_h),
                    "{src:?} {w:?}x{h:?} → ({out_w}, {out_h})"
                );
            }
        }
    }

    // =========================================================================
    // calculate_crop_window tests
    // =========================================================================

    #[test]
    fn crop_window_of_wider_source() {
        // 4:5 window out of 800x600: full height, width 480
        assert_eq!(calculate_crop_window((800, 600), (400, 500)), (480, 600));
    }

    #[test]
    fn crop_window_of_taller_source() {
        assert_eq!(calculate_crop_window((600, 800), (500, 400)), (600, 480));
    }

    #[test]
    fn crop_window_same_aspect_is_whole_source() {
        assert_eq!(calculate_crop_window((800, 600), (400, 300)), (800, 600));
        assert_eq!(calculate_crop_window((10, 20), (100, 200)), (10, 20));
    }

    #[test]
    fn crop_window_stays_inside_extreme_sources() {
        assert_eq!(calculate_crop_window((1, 1000), (8192, 8192)), (1, 1));
        for src in [(1000, 999), (999, 1000), (3, 7), (7000, 2), (1, 1)] {
            for tgt in [(30, 20), (20, 30), (1, 1), (8192, 8192), (641, 479)] {
                let (w, h) = calculate_crop_window(src, tgt);
                assert!(
                    w >= 1 && h >= 1 && w <= src.0 && h <= src.1,
                    "{src:?} {tgt:?} → ({w}, {h})"
                );
            }
        }
    }

    // =========================================================================
    // offsets
    // =========================================================================

    #[test]
    fn center_offset_of_crop_window() {
        assert_eq!(calculate_center_offset((667, 500), (400, 500)), (133, 0));
        assert_eq!(calculate_center_offset((30, 30), (30, 20)), (0, 5));
        assert_eq!(calculate_center_offset((10, 10), (20, 20)), (0, 0));
    }

    #[test]
    fn centered_origin_can_be_negative() {
        assert_eq!(calculate_centered_origin((100, 60), (30, 30)), (35, 15));
        assert_eq!(calculate_centered_origin((20, 20), (30, 30)), (-5, -5));
    }
}
