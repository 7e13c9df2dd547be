//! Swing Core Library
//!
//! This library provides the data model shared by the overlay pipeline:
//! overlay requests, probed video information, normalized placements,
//! tunable sizing configuration and the EXIF orientation codes.

pub mod config;
pub mod geometry;
pub mod orientation;
pub mod placement;
pub mod request;

pub use config::{AvatarStyle, CaptionStyle, OverlayConfig, Rgba8, ScaledClamp, TransformSettings};
pub use orientation::{Orientation, OrientationTransform, Rotation};
pub use placement::{Anchor, Placement, Scale};
pub use request::{OverlayRequest, VideoInfo};

/// Result type for swing-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for swing-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid overlay configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid video dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Unknown orientation code: {0}")]
    UnknownOrientation(u16),
}
