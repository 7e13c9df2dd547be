//! Overlay sizing and placement derived from the video dimensions

use crate::{Anchor, OverlayConfig, Placement, Scale, VideoInfo};
use crate::config::CaptionStyle;

/// Avatar badge edge length in pixels
pub fn avatar_size(config: &OverlayConfig, video: &VideoInfo) -> u32 {
    config.avatar.size.apply(video.shorter_side())
}

/// Distance between the avatar badge and the frame corner
pub fn avatar_margin(config: &OverlayConfig, video: &VideoInfo) -> u32 {
    config.avatar.margin.apply(video.longer_side())
}

/// Distance between the caption card and the bottom frame edge
pub fn caption_margin(config: &OverlayConfig, video: &VideoInfo) -> u32 {
    config.caption.margin.apply(video.height)
}

/// Caption text size in pixels
pub fn caption_text_size(config: &OverlayConfig, video: &VideoInfo) -> f32 {
    config.caption.text_size.apply_unrounded(video.shorter_side())
}

/// Width the caption text is wrapped to
pub fn caption_max_width(config: &OverlayConfig, video: &VideoInfo) -> u32 {
    let ratio = config
        .caption
        .max_width_ratio
        .max(CaptionStyle::MIN_WIDTH_RATIO);
    (video.width as f32 * ratio).floor() as u32
}

/// Places a `width x height` avatar badge in the corner at `(1, 1)` of the
/// frame, inset by the avatar margin.
pub fn avatar_placement(config: &OverlayConfig, video: &VideoInfo, width: u32, height: u32) -> Placement {
    let margin = avatar_margin(config, video) as f32;
    let background = Anchor::new(
        1.0 - margin * 2.0 / video.width as f32,
        1.0 - margin * 2.0 / video.height as f32,
    )
    .clamped();
    Placement::new(
        background,
        Anchor::TOP_RIGHT,
        Scale::native(width, height, video.width, video.height),
    )
}

/// Places a `width x height` caption card at the bottom center of the frame,
/// lifted by the caption margin.
pub fn caption_placement(config: &OverlayConfig, video: &VideoInfo, width: u32, height: u32) -> Placement {
    let margin = caption_margin(config, video) as f32;
    let background = Anchor::new(0.0, -1.0 + margin * 2.0 / video.height as f32).clamped();
    Placement::new(
        background,
        Anchor::BOTTOM_CENTER,
        Scale::native(width, height, video.width, video.height),
    )
}
