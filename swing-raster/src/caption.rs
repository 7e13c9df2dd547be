//! Caption card rasterizer
//!
//! The card is a translucent rounded rectangle holding the caption, word
//! wrapped and center aligned, with an optional brand tagline below it.

use crate::composite::fill_rounded_rect;
use crate::text::{self, FontSet, LineMetrics};
use crate::{Error, Result};
use fontdue::Font;
use image::RgbaImage;
use swing_core::{geometry, OverlayConfig, Rgba8, VideoInfo};
use tracing::{debug, warn};

/// Greedy word wrap of `text` to `max_width`.
///
/// Hard line breaks are kept; a single word wider than `max_width` is broken
/// between characters.
pub fn wrap_text(text: &str, max_width: f32, measure: impl Fn(&str) -> f32) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{current} {word}")
            };
            if measure(&candidate) <= max_width {
                current = candidate;
                continue;
            }
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            if measure(word) <= max_width {
                current = word.to_string();
            } else {
                // break the word itself
                for ch in word.chars() {
                    current.push(ch);
                    if measure(&current) > max_width && current.chars().count() > 1 {
                        current.pop();
                        lines.push(std::mem::take(&mut current));
                        current.push(ch);
                    }
                }
            }
        }
        lines.push(current);
    }
    lines
}

/// A laid out block of lines sharing one font size
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub lines: Vec<String>,
    pub line_widths: Vec<f32>,
    pub metrics: LineMetrics,
}

impl TextBlock {
    pub fn new(lines: Vec<String>, measure: impl Fn(&str) -> f32, metrics: LineMetrics) -> Self {
        let line_widths = lines.iter().map(|line| measure(line)).collect();
        Self {
            lines,
            line_widths,
            metrics,
        }
    }

    pub fn width(&self) -> u32 {
        self.line_widths
            .iter()
            .copied()
            .fold(0.0f32, f32::max)
            .ceil() as u32
    }

    pub fn height(&self) -> u32 {
        (self.lines.len() as f32 * self.metrics.height).ceil() as u32
    }
}

/// Pixel geometry of the card
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardLayout {
    pub width: u32,
    pub height: u32,
    pub content_width: u32,
    pub padding_h: u32,
    pub padding_v: u32,
    /// Top of the tagline block, when there is one
    pub tagline_top: Option<u32>,
}

impl CardLayout {
    /// `main` and `tagline` are `(width, height)` of the text blocks
    pub fn compute(
        main: (u32, u32),
        tagline: Option<(u32, u32)>,
        padding_h: u32,
        padding_v: u32,
        spacing: u32,
    ) -> Self {
        let (tagline_width, tagline_extra) = match tagline {
            Some((width, height)) => (width, height + spacing),
            None => (0, 0),
        };
        let content_width = main.0.max(tagline_width);
        Self {
            width: content_width + padding_h * 2,
            height: main.1 + tagline_extra + padding_v * 2,
            content_width,
            padding_h,
            padding_v,
            tagline_top: tagline.map(|_| padding_v + main.1 + spacing),
        }
    }
}

/// Renders caption cards for a given configuration
pub struct CaptionRasterizer {
    config: OverlayConfig,
    fonts: Option<FontSet>,
}

impl CaptionRasterizer {
    /// Creates a rasterizer, loading the fonts named by the configuration.
    ///
    /// A missing font does not fail construction; captions are then skipped.
    pub fn new(config: OverlayConfig) -> Self {
        let fonts = match FontSet::from_style(&config.caption) {
            Ok(fonts) => Some(fonts),
            Err(e) => {
                warn!(error = %e, "Caption fonts unavailable, captions will be skipped");
                None
            }
        };
        Self { config, fonts }
    }

    pub fn with_fonts(config: OverlayConfig, fonts: FontSet) -> Self {
        Self {
            config,
            fonts: Some(fonts),
        }
    }

    pub fn has_fonts(&self) -> bool {
        self.fonts.is_some()
    }

    /// Builds the card for a `video_width x video_height` video, `None` when
    /// the card cannot be drawn.
    pub fn build(&self, text: &str, video_width: u32, video_height: u32) -> Option<RgbaImage> {
        match self.render(text, video_width, video_height) {
            Ok(card) => Some(card),
            Err(e) => {
                warn!(error = %e, "Caption card skipped");
                None
            }
        }
    }

    fn render(&self, text: &str, video_width: u32, video_height: u32) -> Result<RgbaImage> {
        let fonts = self.fonts.as_ref().ok_or(Error::NoFont)?;
        let style = &self.config.caption;
        let video = VideoInfo::new(video_width, video_height, 0);
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::BlankText);
        }

        let size = geometry::caption_text_size(&self.config, &video);
        let max_width = geometry::caption_max_width(&self.config, &video) as f32;

        let main = layout_block(fonts.regular(), text, size, max_width);
        let tagline = style
            .tagline
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| {
                let tagline_size = (size * style.tagline_ratio).max(style.tagline_min_px);
                (layout_block(fonts.bold(), t, tagline_size, max_width), tagline_size)
            });

        let layout = CardLayout::compute(
            (main.width(), main.height()),
            tagline.as_ref().map(|(block, _)| (block.width(), block.height())),
            style.px(style.padding_h_dp).round() as u32,
            style.px(style.padding_v_dp).round() as u32,
            style.px(style.tagline_spacing_dp).round() as u32,
        );
        debug!(
            text_size = size,
            max_width,
            lines = main.lines.len(),
            width = layout.width,
            height = layout.height,
            "Caption card layout"
        );

        let mut card = RgbaImage::new(layout.width, layout.height);
        fill_rounded_rect(&mut card, style.background, style.px(style.corner_radius_dp));
        draw_block(
            &mut card,
            fonts.regular(),
            &main,
            size,
            &layout,
            layout.padding_v as f32,
            style.text_color,
        );
        if let (Some((block, tagline_size)), Some(top)) = (&tagline, layout.tagline_top) {
            draw_block(
                &mut card,
                fonts.bold(),
                block,
                *tagline_size,
                &layout,
                top as f32,
                style.tagline_color,
            );
        }
        Ok(card)
    }
}

fn layout_block(font: &Font, text: &str, px: f32, max_width: f32) -> TextBlock {
    let measure = |line: &str| text::measure(font, line, px);
    let lines = wrap_text(text, max_width, measure);
    TextBlock::new(lines, measure, text::line_metrics(font, px))
}

fn draw_block(
    card: &mut RgbaImage,
    font: &Font,
    block: &TextBlock,
    px: f32,
    layout: &CardLayout,
    top: f32,
    color: Rgba8,
) {
    for (index, (line, width)) in block.lines.iter().zip(&block.line_widths).enumerate() {
        let x = layout.padding_h as f32 + (layout.content_width as f32 - width) / 2.0;
        let baseline = top + index as f32 * block.metrics.height + block.metrics.ascent;
        text::draw_line(card, font, line, px, x, baseline, color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::find_system_fonts;
    use swing_core::CaptionStyle;

    /// Ten pixels per character
    fn fixed_width(text: &str) -> f32 {
        text.chars().count() as f32 * 10.0
    }

    #[test]
    fn test_short_text_is_one_line() {
        assert_eq!(wrap_text("Great swing!", 500.0, fixed_width), vec!["Great swing!"]);
    }

    #[test]
    fn test_words_wrap_greedily() {
        let lines = wrap_text("one two three four", 90.0, fixed_width);
        assert_eq!(lines, vec!["one two", "three", "four"]);
    }

    #[test]
    fn test_long_word_is_broken() {
        let lines = wrap_text("abcdefghij", 40.0, fixed_width);
        assert_eq!(lines, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn test_hard_breaks_are_kept() {
        let lines = wrap_text("first\nsecond", 500.0, fixed_width);
        assert_eq!(lines, vec!["first", "second"]);
    }

    #[test]
    fn test_card_layout_with_tagline() {
        let layout = CardLayout::compute((400, 120), Some((300, 80)), 72, 66, 42);
        assert_eq!(layout.content_width, 400);
        assert_eq!(layout.width, 400 + 144);
        assert_eq!(layout.height, 120 + 80 + 42 + 132);
        assert_eq!(layout.tagline_top, Some(66 + 120 + 42));
    }

    #[test]
    fn test_card_layout_tagline_can_be_wider() {
        let layout = CardLayout::compute((100, 50), Some((300, 40)), 10, 10, 5);
        assert_eq!(layout.width, 320);
    }

    #[test]
    fn test_card_layout_without_tagline() {
        let layout = CardLayout::compute((400, 120), None, 72, 66, 42);
        assert_eq!(layout.height, 120 + 132);
        assert_eq!(layout.tagline_top, None);
    }

    #[test]
    fn test_block_dimensions() {
        let metrics = LineMetrics {
            ascent: 8.0,
            height: 12.5,
        };
        let block = TextBlock::new(vec!["abc".into(), "abcde".into()], fixed_width, metrics);
        assert_eq!(block.width(), 50);
        assert_eq!(block.height(), 25);
    }

    #[test]
    fn test_missing_fonts_skip_the_card() {
        let mut config = OverlayConfig::default();
        config.caption.font_path = Some("/nonexistent/font.ttf".into());
        let rasterizer = CaptionRasterizer::new(config);
        assert!(!rasterizer.has_fonts());
        assert!(rasterizer.build("Great swing!", 1920, 1080).is_none());
    }

    #[test]
    fn test_card_renders_with_system_font() {
        // Only meaningful where a system font is installed
        let Some((regular, _)) = find_system_fonts() else {
            return;
        };
        let font = FontSet::load_font(&regular).unwrap();
        let rasterizer = CaptionRasterizer::with_fonts(OverlayConfig::default(), FontSet::new(font, None));

        let card = rasterizer.build("Great swing!", 1920, 1080).unwrap();
        let style = CaptionStyle::default();
        assert!(card.width() <= 1632 + 2 * style.px(style.padding_h_dp) as u32);
        assert!(card.height() > 2 * style.px(style.padding_v_dp) as u32);
        // rounded corners stay transparent, the body is the translucent card
        assert_eq!(card.get_pixel(0, 0)[3], 0);
        assert!(card.pixels().any(|p| p[3] == 0xB3));
        // some text pixels were drawn brighter than the black card
        assert!(card.pixels().any(|p| p[0] > 200 && p[3] > 0xB3));
    }
}
