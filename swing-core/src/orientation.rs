//! EXIF orientation codes and the pixel transform that undoes them

use crate::{Error, Result};

/// Orientation tag stored in image metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Orientation {
    Normal,
    FlipHorizontal,
    Rotate180,
    FlipVertical,
    Transpose,
    Rotate90,
    Transverse,
    Rotate270,
}

/// Clockwise rotation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rotation {
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

/// Rotation followed by an optional horizontal mirror
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OrientationTransform {
    pub rotation: Rotation,
    pub flip_horizontal: bool,
}

impl OrientationTransform {
    pub fn is_identity(&self) -> bool {
        self.rotation == Rotation::Deg0 && !self.flip_horizontal
    }

    /// Width and height trade places
    pub fn swaps_dimensions(&self) -> bool {
        matches!(self.rotation, Rotation::Deg90 | Rotation::Deg270)
    }

    /// Destination of source pixel `(x, y)` in a `width x height` image
    pub fn map_pixel(&self, x: u32, y: u32, width: u32, height: u32) -> (u32, u32) {
        let (rx, ry, rw) = match self.rotation {
            Rotation::Deg0 => (x, y, width),
            Rotation::Deg90 => (height - 1 - y, x, height),
            Rotation::Deg180 => (width - 1 - x, height - 1 - y, width),
            Rotation::Deg270 => (y, width - 1 - x, height),
        };
        if self.flip_horizontal {
            (rw - 1 - rx, ry)
        } else {
            (rx, ry)
        }
    }
}

impl Orientation {
    /// Maps the EXIF `Orientation` tag value
    pub fn from_exif(code: u16) -> Option<Self> {
        match code {
            1 => Some(Self::Normal),
            2 => Some(Self::FlipHorizontal),
            3 => Some(Self::Rotate180),
            4 => Some(Self::FlipVertical),
            5 => Some(Self::Transpose),
            6 => Some(Self::Rotate90),
            7 => Some(Self::Transverse),
            8 => Some(Self::Rotate270),
            _ => None,
        }
    }

    /// Like [`Orientation::from_exif`] but reports unknown codes
    pub fn try_from_exif(code: u16) -> Result<Self> {
        Self::from_exif(code).ok_or(Error::UnknownOrientation(code))
    }

    pub fn exif_code(self) -> u16 {
        match self {
            Self::Normal => 1,
            Self::FlipHorizontal => 2,
            Self::Rotate180 => 3,
            Self::FlipVertical => 4,
            Self::Transpose => 5,
            Self::Rotate90 => 6,
            Self::Transverse => 7,
            Self::Rotate270 => 8,
        }
    }

    /// The transform that brings stored pixels upright
    pub fn transform(self) -> OrientationTransform {
        let (rotation, flip_horizontal) = match self {
            Self::Normal => (Rotation::Deg0, false),
            Self::FlipHorizontal => (Rotation::Deg0, true),
            Self::Rotate180 => (Rotation::Deg180, false),
            // a vertical flip is a half turn plus a horizontal mirror
            Self::FlipVertical => (Rotation::Deg180, true),
            Self::Transpose => (Rotation::Deg90, true),
            Self::Rotate90 => (Rotation::Deg90, false),
            Self::Transverse => (Rotation::Deg270, true),
            Self::Rotate270 => (Rotation::Deg270, false),
        };
        OrientationTransform {
            rotation,
            flip_horizontal,
        }
    }
}
