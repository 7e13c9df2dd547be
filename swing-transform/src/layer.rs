//! Static overlay layers composited onto every frame

use image::imageops::{self, FilterType};
use image::RgbaImage;
use swing_core::Placement;
use swing_raster::composite::overlay_onto;

/// What a layer shows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerKind {
    Avatar,
    Caption,
}

impl LayerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LayerKind::Avatar => "avatar",
            LayerKind::Caption => "caption",
        }
    }
}

/// An RGBA bitmap plus where it sits on the frame
#[derive(Debug, Clone)]
pub struct OverlayLayer {
    pub kind: LayerKind,
    pub image: RgbaImage,
    pub placement: Placement,
}

/// A layer resolved against a concrete frame size
#[derive(Debug, Clone)]
pub struct LayerPosition {
    pub x: i32,
    pub y: i32,
    /// Present when the rendered size differs from the bitmap size
    pub resized: Option<RgbaImage>,
}

impl OverlayLayer {
    pub fn new(kind: LayerKind, image: RgbaImage, placement: Placement) -> Self {
        Self {
            kind,
            image,
            placement,
        }
    }

    /// Bytes held by the bitmap
    pub fn byte_size(&self) -> usize {
        self.image.as_raw().len()
    }

    /// Resolves the placement on a `frame_width x frame_height` frame
    pub fn position(&self, frame_width: u32, frame_height: u32) -> LayerPosition {
        let (x, y) = self.placement.top_left(frame_width, frame_height);
        let (width, height) = self.placement.rendered_size(frame_width, frame_height);
        let resized = (width > 0 && height > 0 && (width, height) != self.image.dimensions())
            .then(|| imageops::resize(&self.image, width, height, FilterType::Triangle));
        LayerPosition { x, y, resized }
    }
}

/// Blends `layers` onto `frame` in order
pub fn composite_layers(frame: &mut RgbaImage, layers: &[OverlayLayer], positions: &[LayerPosition]) {
    for (layer, position) in layers.iter().zip(positions) {
        let image = position.resized.as_ref().unwrap_or(&layer.image);
        overlay_onto(frame, image, position.x, position.y);
    }
}
