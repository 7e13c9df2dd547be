//! Alpha compositing and anti-aliased shape coverage

use image::{Rgba, RgbaImage};
use swing_core::Rgba8;

/// Source-over blend of `src` (scaled by `coverage`) onto `dst`
pub fn blend_pixel(dst: &mut Rgba<u8>, src: Rgba8, coverage: f32) {
    let src_alpha = src.alpha() as f32 / 255.0 * coverage.clamp(0.0, 1.0);
    if src_alpha <= 0.0 {
        return;
    }
    let dst_alpha = dst[3] as f32 / 255.0;
    let out_alpha = src_alpha + dst_alpha * (1.0 - src_alpha);
    if out_alpha <= 0.0 {
        *dst = Rgba([0, 0, 0, 0]);
        return;
    }

    let mut out = [0u8; 4];
    for channel in 0..3 {
        let s = src.0[channel] as f32 * src_alpha;
        let d = dst[channel] as f32 * dst_alpha * (1.0 - src_alpha);
        out[channel] = ((s + d) / out_alpha).round().clamp(0.0, 255.0) as u8;
    }
    out[3] = (out_alpha * 255.0).round().clamp(0.0, 255.0) as u8;
    *dst = Rgba(out);
}

/// Overlays one image onto another at the specified position
pub fn overlay_onto(base: &mut RgbaImage, overlay: &RgbaImage, x: i32, y: i32) {
    let base_width = base.width() as i32;
    let base_height = base.height() as i32;
    let overlay_width = overlay.width() as i32;
    let overlay_height = overlay.height() as i32;

    // Calculate the region to copy
    let src_x_start = 0.max(-x);
    let src_y_start = 0.max(-y);
    let src_x_end = overlay_width.min(base_width - x);
    let src_y_end = overlay_height.min(base_height - y);

    if src_x_start >= src_x_end || src_y_start >= src_y_end {
        return; // Nothing to overlay
    }

    for src_y in src_y_start..src_y_end {
        for src_x in src_x_start..src_x_end {
            let overlay_pixel = overlay.get_pixel(src_x as u32, src_y as u32);
            if overlay_pixel[3] == 0 {
                continue;
            }
            let dest = base.get_pixel_mut((x + src_x) as u32, (y + src_y) as u32);
            blend_pixel(dest, Rgba8(overlay_pixel.0), 1.0);
        }
    }
}

/// Fraction of the unit pixel centered at `(px, py)` inside a circle.
///
/// Approximated from the signed distance to the edge, which is exact enough
/// for radii of a few pixels and up.
pub fn circle_coverage(px: f32, py: f32, cx: f32, cy: f32, radius: f32) -> f32 {
    let distance = ((px - cx).powi(2) + (py - cy).powi(2)).sqrt();
    (radius - distance + 0.5).clamp(0.0, 1.0)
}

/// Coverage of a ring of `width` centered on `radius`
pub fn ring_coverage(px: f32, py: f32, cx: f32, cy: f32, radius: f32, width: f32) -> f32 {
    let distance = ((px - cx).powi(2) + (py - cy).powi(2)).sqrt();
    let half = width / 2.0;
    (half - (distance - radius).abs() + 0.5).clamp(0.0, 1.0)
}

/// Coverage of a `width x height` rounded rectangle anchored at the origin
pub fn rounded_rect_coverage(px: f32, py: f32, width: f32, height: f32, radius: f32) -> f32 {
    let radius = radius.min(width / 2.0).min(height / 2.0).max(0.0);
    // distance to the inner rectangle shrunk by the radius
    let qx = ((px - width / 2.0).abs() - (width / 2.0 - radius)).max(0.0);
    let qy = ((py - height / 2.0).abs() - (height / 2.0 - radius)).max(0.0);
    let outside = (qx * qx + qy * qy).sqrt() - radius;
    let edge = (px.min(width - px)).min(py.min(height - py));
    (0.5 - outside).clamp(0.0, 1.0).min((edge + 0.5).clamp(0.0, 1.0))
}

/// Fills the whole image with a rounded rectangle of the given color
pub fn fill_rounded_rect(image: &mut RgbaImage, color: Rgba8, radius: f32) {
    let width = image.width() as f32;
    let height = image.height() as f32;
    for (x, y, pixel) in image.enumerate_pixels_mut() {
        let coverage = rounded_rect_coverage(x as f32 + 0.5, y as f32 + 0.5, width, height, radius);
        blend_pixel(pixel, color, coverage);
    }
}
