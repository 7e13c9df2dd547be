//! Swing Overlay Library
//!
//! Burns a circular avatar badge and a caption card into a video. The
//! [`OverlayCompositor`] orchestrates a single request; the [`OverlayWorker`]
//! runs requests one at a time on a background thread and the
//! [`OverlayChannel`] maps method-call style commands onto it.

pub mod channel;
pub mod compositor;
pub mod validate;
pub mod worker;

pub use channel::{ChannelError, Command, OverlayChannel, ProcessVideoArgs, Reply};
pub use compositor::OverlayCompositor;
pub use worker::{JobTicket, OverlayWorker};

pub use swing_core::{OverlayConfig, OverlayRequest, VideoInfo};
pub use swing_transform::CancelToken;

use std::path::PathBuf;
use std::time::Duration;

/// Result type for swing-overlay operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for swing-overlay operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Input video not found: {0}")]
    InputMissing(PathBuf),

    #[error("Video geometry unknown for {path}: {reason}")]
    GeometryUnknown { path: PathBuf, reason: String },

    #[error("Transform failed: {0}")]
    TransformFailure(#[from] swing_transform::Error),

    #[error("Transform did not complete within {0:?}")]
    TransformTimeout(Duration),

    #[error("Interrupted while waiting for the transform")]
    InterruptedWait,

    #[error("Output {0} would overwrite the input video")]
    OutputIsInput(PathBuf),

    #[error("Output video missing: {0}")]
    OutputMissing(PathBuf),

    #[error("Output video is empty: {0}")]
    OutputEmpty(PathBuf),

    #[error("Output video unreadable {path}: {reason}")]
    OutputUnreadable { path: PathBuf, reason: String },

    #[error("Invalid configuration: {0}")]
    Config(#[from] swing_core::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Overlay worker has shut down")]
    WorkerGone,
}

/// Broad failure class of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Io,
    Geometry,
    Transform,
    Validation,
}

impl Error {
    /// Error code reported to callers
    pub fn code(&self) -> &'static str {
        match self {
            Error::InputMissing(_) => "file_not_found",
            _ => "overlay_failed",
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InputMissing(_) | Error::Io(_) | Error::WorkerGone => ErrorCategory::Io,
            Error::GeometryUnknown { .. } | Error::Config(_) => ErrorCategory::Geometry,
            Error::TransformFailure(_) | Error::TransformTimeout(_) | Error::InterruptedWait => {
                ErrorCategory::Transform
            }
            Error::OutputIsInput(_)
            | Error::OutputMissing(_)
            | Error::OutputEmpty(_)
            | Error::OutputUnreadable { .. } => ErrorCategory::Validation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_missing_input_is_file_not_found() {
        assert_eq!(Error::InputMissing("a.mp4".into()).code(), "file_not_found");
        assert_eq!(Error::InterruptedWait.code(), "overlay_failed");
        assert_eq!(Error::OutputEmpty("b.mp4".into()).code(), "overlay_failed");
        assert_eq!(Error::OutputIsInput("c.mp4".into()).code(), "overlay_failed");
        assert_eq!(
            Error::TransformTimeout(Duration::from_secs(1)).code(),
            "overlay_failed"
        );
    }

    #[test]
    fn test_categories() {
        assert_eq!(Error::InputMissing("a".into()).category(), ErrorCategory::Io);
        assert_eq!(
            Error::GeometryUnknown {
                path: "a".into(),
                reason: "0x0".into()
            }
            .category(),
            ErrorCategory::Geometry
        );
        assert_eq!(
            Error::TransformFailure(swing_transform::Error::Cancelled).category(),
            ErrorCategory::Transform
        );
        assert_eq!(
            Error::OutputMissing("a".into()).category(),
            ErrorCategory::Validation
        );
    }
}
