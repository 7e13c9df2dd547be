//! Tunable overlay configuration
//!
//! Every sizing coefficient of the overlay pipeline lives here so a single
//! consistent set is used for a whole run.

use crate::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;

/// `clamp(floor(base * ratio), min, max)`
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScaledClamp {
    pub ratio: f32,
    pub min: u32,
    pub max: u32,
}

impl ScaledClamp {
    pub const fn new(ratio: f32, min: u32, max: u32) -> Self {
        Self { ratio, min, max }
    }

    /// Scales `base` and clamps the result into `[min, max]`
    pub fn apply(&self, base: u32) -> u32 {
        let scaled = (base as f64 * self.ratio as f64).floor();
        let scaled = if scaled >= u32::MAX as f64 {
            u32::MAX
        } else {
            scaled.max(0.0) as u32
        };
        scaled.clamp(self.min, self.max)
    }

    /// Like [`apply`](Self::apply) but keeps the fractional part
    pub fn apply_unrounded(&self, base: u32) -> f32 {
        (base as f32 * self.ratio).clamp(self.min as f32, self.max as f32)
    }

    fn validate(&self, name: &str) -> Result<()> {
        if !self.ratio.is_finite() || self.ratio <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "{name}: ratio must be positive, got {}",
                self.ratio
            )));
        }
        if self.min > self.max {
            return Err(Error::InvalidConfig(format!(
                "{name}: min {} is greater than max {}",
                self.min, self.max
            )));
        }
        Ok(())
    }
}

/// Straight (non-premultiplied) RGBA color
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rgba8(pub [u8; 4]);

impl Rgba8 {
    pub const WHITE: Rgba8 = Rgba8([255, 255, 255, 255]);

    /// Builds a color from an `0xAARRGGBB` value
    pub const fn from_argb(argb: u32) -> Self {
        Rgba8([
            (argb >> 16) as u8,
            (argb >> 8) as u8,
            argb as u8,
            (argb >> 24) as u8,
        ])
    }

    pub fn alpha(&self) -> u8 {
        self.0[3]
    }
}

/// Avatar badge sizing
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(default))]
pub struct AvatarStyle {
    /// Badge size from the shorter video side
    pub size: ScaledClamp,
    /// Corner margin from the longer video side
    pub margin: ScaledClamp,
    /// Border stroke width as a fraction of the badge size
    pub border_ratio: f32,
    /// Allocation limit for decoding the source photo
    pub decode_budget_bytes: u64,
}

impl Default for AvatarStyle {
    fn default() -> Self {
        Self {
            size: ScaledClamp::new(0.52, 420, 760),
            margin: ScaledClamp::new(0.05, 48, 120),
            border_ratio: 0.04,
            decode_budget_bytes: 256 * 1024 * 1024,
        }
    }
}

/// Caption card sizing and colors
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(default))]
pub struct CaptionStyle {
    /// Text size in pixels from the shorter video side
    pub text_size: ScaledClamp,
    /// Bottom margin from the video height
    pub margin: ScaledClamp,
    /// Maximum text width as a fraction of the video width
    pub max_width_ratio: f32,
    /// Pixels per density-independent unit
    pub density: f32,
    pub padding_h_dp: f32,
    pub padding_v_dp: f32,
    pub corner_radius_dp: f32,
    /// Secondary brand line drawn below the caption
    pub tagline: Option<String>,
    pub tagline_spacing_dp: f32,
    /// Tagline size relative to the caption text size
    pub tagline_ratio: f32,
    /// Lower bound of the tagline text size in pixels
    pub tagline_min_px: f32,
    pub background: Rgba8,
    pub text_color: Rgba8,
    pub tagline_color: Rgba8,
    /// Regular face; system fonts are searched when unset
    pub font_path: Option<PathBuf>,
    /// Bold face for the tagline; the regular face is used when unset
    pub bold_font_path: Option<PathBuf>,
}

impl CaptionStyle {
    /// Lower bound of the wrap width ratio
    pub const MIN_WIDTH_RATIO: f32 = 0.55;

    /// Converts density-independent units to pixels
    pub fn px(&self, dp: f32) -> f32 {
        dp * self.density
    }
}

impl Default for CaptionStyle {
    fn default() -> Self {
        Self {
            text_size: ScaledClamp::new(0.104, 96, 168),
            margin: ScaledClamp::new(0.085, 72, 160),
            max_width_ratio: 0.85,
            density: 3.0,
            padding_h_dp: 24.0,
            padding_v_dp: 22.0,
            corner_radius_dp: 16.0,
            tagline: Some("Tekswing".to_string()),
            tagline_spacing_dp: 14.0,
            tagline_ratio: 0.82,
            tagline_min_px: 60.0,
            background: Rgba8::from_argb(0xB300_0000),
            text_color: Rgba8::WHITE,
            tagline_color: Rgba8::from_argb(0xF2FF_FFFF),
            font_path: None,
            bold_font_path: None,
        }
    }
}

/// Transform stage behaviour
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(default))]
pub struct TransformSettings {
    /// Upper bound for the whole transform, start to completion
    pub timeout_secs: u64,
    /// How long teardown waits for the transform thread to stop
    pub shutdown_grace_ms: u64,
    /// Preferred H.264 encoder name
    pub video_encoder: String,
}

impl TransformSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

impl Default for TransformSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 600,
            shutdown_grace_ms: 5_000,
            video_encoder: "libx264".to_string(),
        }
    }
}

/// Complete overlay pipeline configuration
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(default))]
pub struct OverlayConfig {
    pub avatar: AvatarStyle,
    pub caption: CaptionStyle,
    pub transform: TransformSettings,
}

impl OverlayConfig {
    /// Checks every coefficient for consistency
    pub fn validate(&self) -> Result<()> {
        self.avatar.size.validate("avatar.size")?;
        self.avatar.margin.validate("avatar.margin")?;
        self.caption.text_size.validate("caption.text_size")?;
        self.caption.margin.validate("caption.margin")?;

        if !(0.0..0.5).contains(&self.avatar.border_ratio) {
            return Err(Error::InvalidConfig(format!(
                "avatar.border_ratio must be in [0, 0.5), got {}",
                self.avatar.border_ratio
            )));
        }
        if !(self.caption.density.is_finite() && self.caption.density > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "caption.density must be positive, got {}",
                self.caption.density
            )));
        }
        if !(self.caption.max_width_ratio > 0.0 && self.caption.max_width_ratio <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "caption.max_width_ratio must be in (0, 1], got {}",
                self.caption.max_width_ratio
            )));
        }
        if self.transform.timeout_secs == 0 {
            return Err(Error::InvalidConfig(
                "transform.timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
