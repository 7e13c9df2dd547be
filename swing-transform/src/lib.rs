//! Swing Transform Library
//!
//! This library drives the opaque video transform stage: probing videos,
//! running a transform on its own thread behind one-shot start and
//! completion gates, and the FFmpeg implementation of both collaborators.

pub mod gate;
pub mod job;
pub mod layer;
pub mod progress;
pub mod runner;

#[cfg(feature = "ffmpeg")]
pub mod ffmpeg_transform;
#[cfg(feature = "ffmpeg")]
pub mod probe;

pub use gate::{one_shot, CancelToken, Gate, OneShot};
pub use job::{ActiveTransform, Prober, TransformJob, TransformOutcome, TransformReport, Transformer};
pub use layer::{LayerKind, OverlayLayer};
pub use runner::{TransformHandle, TransformRunner, WaitError};

#[cfg(feature = "ffmpeg")]
pub use ffmpeg_transform::FfmpegTransformer;
#[cfg(feature = "ffmpeg")]
pub use probe::FfmpegProber;

use std::path::PathBuf;

/// Result type for swing-transform operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for swing-transform operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "ffmpeg")]
    #[error("FFmpeg error: {0}")]
    Ffmpeg(#[from] ffmpeg_next::Error),

    #[error("No video stream found in {0}")]
    NoVideoStream(PathBuf),

    #[error("No H.264 encoder available (wanted {0})")]
    EncoderNotFound(String),

    #[error("Invalid transform job: {0}")]
    InvalidJob(String),

    #[error("Invalid video frame: {0}")]
    InvalidFrame(String),

    #[error("Transform cancelled")]
    Cancelled,

    #[error("Transform thread ended without reporting its {0}")]
    Disconnected(&'static str),

    #[error("Transform failed: {0}")]
    Failed(String),
}

/// Output video codec
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoCodec {
    H264,
}

/// Output audio codec
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioCodec {
    Aac,
}

/// Encoder configuration for one transform
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderSettings {
    pub video_codec: VideoCodec,
    pub audio_codec: AudioCodec,
    /// Explicit video bitrate; `None` lets the encoder pick its quality default
    pub target_bitrate: Option<u64>,
    /// Output frame size, locked to the source size
    pub width: u32,
    pub height: u32,
    /// Preferred encoder implementation
    pub video_encoder: String,
}

impl EncoderSettings {
    /// H.264/AAC at the given size
    pub fn h264_aac(width: u32, height: u32) -> Self {
        Self {
            video_codec: VideoCodec::H264,
            audio_codec: AudioCodec::Aac,
            target_bitrate: None,
            width,
            height,
            video_encoder: "libx264".to_string(),
        }
    }

    pub fn with_target_bitrate(mut self, bitrate: Option<u64>) -> Self {
        self.target_bitrate = bitrate;
        self
    }

    pub fn with_video_encoder(mut self, name: impl Into<String>) -> Self {
        self.video_encoder = name.into();
        self
    }

    /// Frame size rounded down to even values, as 4:2:0 chroma requires
    pub fn even_size(&self) -> (u32, u32) {
        ((self.width & !1).max(2), (self.height & !1).max(2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_even_size() {
        assert_eq!(EncoderSettings::h264_aac(1920, 1080).even_size(), (1920, 1080));
        assert_eq!(EncoderSettings::h264_aac(721, 405).even_size(), (720, 404));
        assert_eq!(EncoderSettings::h264_aac(1, 1).even_size(), (2, 2));
    }

    #[test]
    fn test_bitrate_is_optional() {
        let settings = EncoderSettings::h264_aac(640, 360).with_target_bitrate(Some(2_000_000));
        assert_eq!(settings.target_bitrate, Some(2_000_000));
        assert_eq!(settings.video_codec, VideoCodec::H264);
        assert_eq!(settings.audio_codec, AudioCodec::Aac);
    }
}
