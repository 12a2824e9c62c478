//! Pure calculation functions for rendition geometry.
//!
//! All functions here are pure and testable without any I/O or images.

use crate::ppoi::Ppoi;

/// Calculate the size of an image scaled to fit inside a box.
///
/// Aspect ratio is preserved and nothing is cropped, so at most one side
/// matches the box exactly. With `allow_upscale = false` a source that already
/// fits is returned at its own size.
///
/// # Examples
/// ```
/// # use renditions::imaging::calculate_fit_dimensions;
/// // 400x200 into a 100x100 box → 100x50
/// assert_eq!(calculate_fit_dimensions((400, 200), (100, 100), true), (100, 50));
///
/// // 50x25 into 100x100, upscaling → 100x50; without → unchanged
/// assert_eq!(calculate_fit_dimensions((50, 25), (100, 100), true), (100, 50));
/// assert_eq!(calculate_fit_dimensions((50, 25), (100, 100), false), (50, 25));
/// ```
pub fn calculate_fit_dimensions(
    source: (u32, u32),
    target: (u32, u32),
    allow_upscale: bool,
) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;

    let scale_w = tgt_w as f64 / src_w as f64;
    let scale_h = tgt_h as f64 / src_h as f64;
    let scale = scale_w.min(scale_h);
    if !allow_upscale && scale >= 1.0 {
        return source;
    }

    // The constraining side is set exactly to avoid float drift.
    if scale_w <= scale_h {
        let h = ((src_h as f64 * scale).round() as u32).clamp(1, tgt_h);
        (tgt_w, h)
    } else {
        let w = ((src_w as f64 * scale).round() as u32).clamp(1, tgt_w);
        (w, tgt_h)
    }
}

/// Calculate dimensions needed to fill a target area (resize before crop).
///
/// Returns dimensions that completely cover the target area while maintaining
/// the source aspect ratio. One dimension will match exactly, the other may exceed.
///
/// # Arguments
/// * `source` - Original image dimensions (width, height)
/// * `target` - Target area dimensions (width, height)
///
/// # Returns
/// * `(width, height)` - Fill dimensions (at least one matches target)
pub fn calculate_fill_dimensions(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;

    let src_aspect = src_w as f64 / src_h as f64;
    let tgt_aspect = tgt_w as f64 / tgt_h as f64;

    if src_aspect > tgt_aspect {
        // Source is wider: height will match, width will exceed
        let h = tgt_h;
        let w = ((h as f64 * src_aspect).round() as u32).max(tgt_w);
        (w, h)
    } else {
        // Source is taller: width will match, height will exceed
        let w = tgt_w;
        let h = ((w as f64 / src_aspect).round() as u32).max(tgt_h);
        (w, h)
    }
}

/// Crop region within a (scaled) image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropWindow {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Place a `target`-sized window inside `scaled`, anchored on the PPOI.
///
/// Along each axis the offset is `floor(ppoi * overflow)`, clamped to
/// `[0, overflow]`: a PPOI of 0 keeps the leading edge, 1 the trailing edge,
/// 0.5 centres the window.
pub fn calculate_crop_window(scaled: (u32, u32), target: (u32, u32), ppoi: Ppoi) -> CropWindow {
    let (scaled_w, scaled_h) = scaled;
    let width = target.0.min(scaled_w);
    let height = target.1.min(scaled_h);

    let offset = |fraction: f64, overflow: u32| -> u32 {
        ((fraction * overflow as f64).floor() as u32).min(overflow)
    };

    CropWindow {
        x: offset(ppoi.x(), scaled_w - width),
        y: offset(ppoi.y(), scaled_h - height),
        width,
        height,
    }
}
