//! Overlay request and probed video information

use std::path::{Path, PathBuf};

/// A single "burn overlays into this video" request
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OverlayRequest {
    /// Source video
    pub input_path: PathBuf,
    /// Where the composited (or copied) video is written
    pub output_path: PathBuf,
    /// Whether the avatar badge should be attached
    pub attach_avatar: bool,
    /// Avatar image, only used when `attach_avatar` is set
    pub avatar_path: Option<PathBuf>,
    /// Whether the caption card should be attached
    pub attach_caption: bool,
    /// Caption text, only used when `attach_caption` is set
    pub caption_text: String,
}

impl OverlayRequest {
    /// Creates a request with no overlays attached
    pub fn new(input_path: impl Into<PathBuf>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            input_path: input_path.into(),
            output_path: output_path.into(),
            attach_avatar: false,
            avatar_path: None,
            attach_caption: false,
            caption_text: String::new(),
        }
    }

    /// Attaches an avatar badge from the given image
    pub fn with_avatar(mut self, path: impl Into<PathBuf>) -> Self {
        self.attach_avatar = true;
        self.avatar_path = Some(path.into());
        self
    }

    /// Attaches a caption card with the given text
    pub fn with_caption(mut self, text: impl Into<String>) -> Self {
        self.attach_caption = true;
        self.caption_text = text.into();
        self
    }

    /// Returns the avatar image path if an avatar should be built
    pub fn avatar(&self) -> Option<&Path> {
        if !self.attach_avatar {
            return None;
        }
        self.avatar_path
            .as_deref()
            .filter(|path| !path.as_os_str().is_empty())
    }

    /// Returns the trimmed caption if a caption should be built
    pub fn caption(&self) -> Option<&str> {
        if !self.attach_caption {
            return None;
        }
        let trimmed = self.caption_text.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }

    /// True when no overlay is requested and the request is a plain copy.
    ///
    /// An avatar flag without a path still counts as a request for an
    /// overlay; the compositor falls back to a copy once it finds no layer
    /// could be built.
    pub fn is_passthrough(&self) -> bool {
        !self.attach_avatar && self.caption().is_none()
    }
}

/// Video stream information obtained by probing a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VideoInfo {
    /// Display width in pixels
    pub width: u32,
    /// Display height in pixels
    pub height: u32,
    /// Bits per second, 0 when unknown
    pub bitrate: u64,
}

impl VideoInfo {
    /// Creates a new video info
    pub fn new(width: u32, height: u32, bitrate: u64) -> Self {
        Self {
            width,
            height,
            bitrate,
        }
    }

    /// Both dimensions are known
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// Returns `self` when both dimensions are known
    pub fn validated(self) -> crate::Result<Self> {
        if self.is_valid() {
            Ok(self)
        } else {
            Err(crate::Error::InvalidDimensions {
                width: self.width,
                height: self.height,
            })
        }
    }

    pub fn shorter_side(&self) -> u32 {
        self.width.min(self.height)
    }

    pub fn longer_side(&self) -> u32 {
        self.width.max(self.height)
    }

    /// Bitrate to request from the encoder, `None` when unknown
    pub fn target_bitrate(&self) -> Option<u64> {
        (self.bitrate > 0).then_some(self.bitrate)
    }
}
