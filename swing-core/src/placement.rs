//! Normalized overlay placement
//!
//! Anchors use normalized device coordinates: `(0, 0)` is the center of a
//! surface, `(1, 1)` its top-right corner and `(-1, -1)` its bottom-left
//! corner. A placement aligns the overlay's anchor point with the
//! background's anchor point.

/// A normalized point in `[-1, 1] x [-1, 1]`, y pointing up
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Anchor {
    pub x: f32,
    pub y: f32,
}

impl Anchor {
    pub const CENTER: Anchor = Anchor { x: 0.0, y: 0.0 };
    pub const TOP_RIGHT: Anchor = Anchor { x: 1.0, y: 1.0 };
    pub const BOTTOM_CENTER: Anchor = Anchor { x: 0.0, y: -1.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Clamps both axes into `[-1, 1]`
    pub fn clamped(self) -> Self {
        Self {
            x: self.x.clamp(-1.0, 1.0),
            y: self.y.clamp(-1.0, 1.0),
        }
    }

    /// Pixel offset of this anchor on a `width x height` surface (y down)
    pub fn to_pixels(self, width: u32, height: u32) -> (f32, f32) {
        (
            (self.x + 1.0) * 0.5 * width as f32,
            (1.0 - self.y) * 0.5 * height as f32,
        )
    }
}

/// Overlay size relative to the video size, per axis
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Scale {
    pub x: f32,
    pub y: f32,
}

impl Scale {
    /// Scale that renders an overlay at its native pixel size on the given video
    pub fn native(overlay_width: u32, overlay_height: u32, video_width: u32, video_height: u32) -> Self {
        Self {
            x: overlay_width as f32 / video_width.max(1) as f32,
            y: overlay_height as f32 / video_height.max(1) as f32,
        }
    }
}

/// Where and how large an overlay appears on every frame
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Placement {
    /// Anchor on the video frame
    pub background_anchor: Anchor,
    /// Anchor on the overlay image
    pub overlay_anchor: Anchor,
    /// Rendered size relative to the frame
    pub scale: Scale,
}

impl Placement {
    /// Creates a new placement
    pub fn new(background_anchor: Anchor, overlay_anchor: Anchor, scale: Scale) -> Self {
        Self {
            background_anchor,
            overlay_anchor,
            scale,
        }
    }

    /// Rendered overlay size in pixels on a `frame_width x frame_height` frame
    pub fn rendered_size(&self, frame_width: u32, frame_height: u32) -> (u32, u32) {
        (
            (self.scale.x * frame_width as f32).round().max(0.0) as u32,
            (self.scale.y * frame_height as f32).round().max(0.0) as u32,
        )
    }

    /// Top-left pixel of the rendered overlay (can be negative for partially
    /// off-screen overlays)
    pub fn top_left(&self, frame_width: u32, frame_height: u32) -> (i32, i32) {
        let (overlay_width, overlay_height) = self.rendered_size(frame_width, frame_height);
        let (bx, by) = self.background_anchor.to_pixels(frame_width, frame_height);
        let (ox, oy) = self.overlay_anchor.to_pixels(overlay_width, overlay_height);
        ((bx - ox).round() as i32, (by - oy).round() as i32)
    }
}
