//! Circular avatar badge rasterizer

use crate::composite::{blend_pixel, circle_coverage, ring_coverage};
use crate::orientation::{normalize, ImageMetadataOrientation, OrientationSource};
use crate::{decode, Error, Result};
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use std::path::Path;
use swing_core::{AvatarStyle, Rgba8};
use tracing::{debug, warn};

/// Cuts a photo into a round badge with a white border
pub struct AvatarRasterizer {
    orientation: Box<dyn OrientationSource>,
    border_ratio: f32,
    decode_budget_bytes: u64,
}

impl AvatarRasterizer {
    /// Creates a rasterizer reading orientation from image metadata
    pub fn new(style: &AvatarStyle) -> Self {
        Self {
            orientation: Box::new(ImageMetadataOrientation),
            border_ratio: style.border_ratio,
            decode_budget_bytes: style.decode_budget_bytes,
        }
    }

    /// Replaces the orientation metadata reader
    pub fn with_orientation_source(mut self, source: impl OrientationSource + 'static) -> Self {
        self.orientation = Box::new(source);
        self
    }

    /// Builds a `target x target` badge, `None` when the photo is unusable.
    ///
    /// Decode failures, including running over the decode budget, are logged
    /// and reported as no badge.
    pub fn build(&self, path: &Path, target: u32) -> Option<RgbaImage> {
        match self.try_build(path, target) {
            Ok(badge) => {
                debug!(path = %path.display(), size = target, "Avatar badge ready");
                Some(badge)
            }
            Err(e @ Error::DecodeBudget { .. }) => {
                warn!(path = %path.display(), error = %e, "Avatar too large to decode, skipping");
                None
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Avatar unusable, skipping");
                None
            }
        }
    }

    pub fn try_build(&self, path: &Path, target: u32) -> Result<RgbaImage> {
        if target == 0 {
            return Err(Error::ZeroSize);
        }
        let decoded = decode::decode_sampled(path, target, self.decode_budget_bytes)?;
        debug!(
            width = decoded.width(),
            height = decoded.height(),
            "Avatar decoded"
        );
        let upright = normalize(decoded, path, self.orientation.as_ref());
        let square = crop_center_square(upright);
        let scaled = imageops::resize(&square, target, target, FilterType::Lanczos3);
        drop(square);
        Ok(circular_badge(scaled, target as f32 * self.border_ratio))
    }
}

/// Center square using the shorter side
pub fn crop_center_square(image: RgbaImage) -> RgbaImage {
    let (width, height) = image.dimensions();
    if width == height {
        return image;
    }
    let size = width.min(height);
    let x = (width - size) / 2;
    let y = (height - size) / 2;
    imageops::crop_imm(&image, x, y, size, size).to_image()
}

/// Masks a square image to a circle and strokes a white border on its rim
pub fn circular_badge(square: RgbaImage, border_width: f32) -> RgbaImage {
    let size = square.width() as f32;
    let center = size / 2.0;
    let radius = size / 2.0;

    let mut badge = square;
    for (x, y, pixel) in badge.enumerate_pixels_mut() {
        let (px, py) = (x as f32 + 0.5, y as f32 + 0.5);
        let coverage = circle_coverage(px, py, center, center, radius);
        let alpha = (pixel[3] as f32 * coverage).round() as u8;
        *pixel = if alpha == 0 {
            Rgba([0, 0, 0, 0])
        } else {
            Rgba([pixel[0], pixel[1], pixel[2], alpha])
        };

        if border_width > 0.0 {
            let ring = ring_coverage(px, py, center, center, radius - border_width / 2.0, border_width);
            blend_pixel(pixel, Rgba8::WHITE, ring);
        }
    }
    badge
}
