//! Orientation normalization for photos

use crate::{Error, Result};
use image::metadata::Orientation as ImageOrientation;
use image::{imageops, ImageDecoder, ImageReader, RgbaImage};
use std::path::Path;
use swing_core::{Orientation, Rotation};
use tracing::{debug, warn};

/// Reads the orientation tag of an image file
pub trait OrientationSource: Send + Sync {
    fn read_orientation(&self, path: &Path) -> Result<Orientation>;
}

/// Reads orientation from the metadata the `image` decoders expose
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageMetadataOrientation;

impl OrientationSource for ImageMetadataOrientation {
    fn read_orientation(&self, path: &Path) -> Result<Orientation> {
        let read_error = |reason: String| Error::OrientationRead {
            path: path.to_path_buf(),
            reason,
        };
        let mut decoder = ImageReader::open(path)?
            .with_guessed_format()?
            .into_decoder()
            .map_err(|e| read_error(e.to_string()))?;
        let orientation = decoder
            .orientation()
            .map_err(|e| read_error(e.to_string()))?;

        Ok(match orientation {
            ImageOrientation::NoTransforms => Orientation::Normal,
            ImageOrientation::Rotate90 => Orientation::Rotate90,
            ImageOrientation::Rotate180 => Orientation::Rotate180,
            ImageOrientation::Rotate270 => Orientation::Rotate270,
            ImageOrientation::FlipHorizontal => Orientation::FlipHorizontal,
            ImageOrientation::FlipVertical => Orientation::FlipVertical,
            ImageOrientation::Rotate90FlipH => Orientation::Transpose,
            ImageOrientation::Rotate270FlipH => Orientation::Transverse,
        })
    }
}

/// Bakes `orientation` into the pixels.
///
/// Returns the input untouched for [`Orientation::Normal`]; otherwise the
/// input buffer is released once the transformed copy exists.
pub fn apply_orientation(image: RgbaImage, orientation: Orientation) -> RgbaImage {
    let transform = orientation.transform();
    if transform.is_identity() {
        return image;
    }

    let rotated = match transform.rotation {
        Rotation::Deg0 => image,
        Rotation::Deg90 => imageops::rotate90(&image),
        Rotation::Deg180 => imageops::rotate180(&image),
        Rotation::Deg270 => imageops::rotate270(&image),
    };
    if transform.flip_horizontal {
        imageops::flip_horizontal(&rotated)
    } else {
        rotated
    }
}

/// Corrects `image` using the orientation stored in the file at `path`.
///
/// Unreadable metadata is not fatal: the image is returned as decoded.
pub fn normalize(image: RgbaImage, path: &Path, source: &dyn OrientationSource) -> RgbaImage {
    let orientation = match source.read_orientation(path) {
        Ok(orientation) => orientation,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Keeping original orientation");
            return image;
        }
    };
    if orientation == Orientation::Normal {
        return image;
    }

    let normalized = apply_orientation(image, orientation);
    debug!(
        path = %path.display(),
        orientation = orientation.exif_code(),
        width = normalized.width(),
        height = normalized.height(),
        "Applied orientation"
    );
    normalized
}
