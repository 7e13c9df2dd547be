//! Swing Raster Library
//!
//! This library turns overlay inputs into RGBA bitmaps: a circular avatar
//! badge cut from a photo, a rounded caption card with wrapped text, and the
//! orientation correction applied to photos before they are cut.

pub mod avatar;
pub mod caption;
pub mod composite;
pub mod decode;
pub mod orientation;
pub mod text;

pub use avatar::AvatarRasterizer;
pub use caption::CaptionRasterizer;
pub use orientation::{ImageMetadataOrientation, OrientationSource};
pub use text::FontSet;

use std::path::PathBuf;

/// Result type for swing-raster operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for swing-raster operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JPEG error: {0}")]
    Jpeg(#[from] jpeg_decoder::Error),

    #[error("Image {path} has no readable dimensions")]
    UnreadableBounds { path: PathBuf },

    #[error("Decoding {path} exceeds the {budget} byte budget")]
    DecodeBudget { path: PathBuf, budget: u64 },

    #[error("Orientation metadata unreadable for {path}: {reason}")]
    OrientationRead { path: PathBuf, reason: String },

    #[error("Font error: {0}")]
    Font(String),

    #[error("No usable font found")]
    NoFont,

    #[error("Requested overlay size is zero")]
    ZeroSize,

    #[error("Caption text is blank")]
    BlankText,
}
