//! Font loading and single-line text drawing

use crate::composite::blend_pixel;
use crate::{Error, Result};
use fontdue::{Font, FontSettings};
use image::RgbaImage;
use std::fs;
use std::path::{Path, PathBuf};
use swing_core::{CaptionStyle, Rgba8};
use tracing::debug;

/// Well known (regular, bold) system font locations, tried in order
const SYSTEM_FONTS: &[(&str, &str)] = &[
    (
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    ),
    (
        "/usr/share/fonts/TTF/DejaVuSans.ttf",
        "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
    ),
    (
        "/usr/share/fonts/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/dejavu/DejaVuSans-Bold.ttf",
    ),
    (
        "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
        "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
    ),
    (
        "/usr/share/fonts/truetype/noto/NotoSans-Regular.ttf",
        "/usr/share/fonts/truetype/noto/NotoSans-Bold.ttf",
    ),
    (
        "/System/Library/Fonts/Supplemental/Arial.ttf",
        "/System/Library/Fonts/Supplemental/Arial Bold.ttf",
    ),
    ("/Library/Fonts/Arial.ttf", "/Library/Fonts/Arial Bold.ttf"),
    ("C:\\Windows\\Fonts\\arial.ttf", "C:\\Windows\\Fonts\\arialbd.ttf"),
];

/// Regular face plus an optional bold face
pub struct FontSet {
    regular: Font,
    bold: Option<Font>,
}

impl FontSet {
    /// Loads a font file
    pub fn load_font(path: &Path) -> Result<Font> {
        let bytes = fs::read(path)?;
        Font::from_bytes(bytes, FontSettings::default())
            .map_err(|e| Error::Font(format!("failed to parse {}: {e}", path.display())))
    }

    pub fn new(regular: Font, bold: Option<Font>) -> Self {
        Self { regular, bold }
    }

    /// Loads the faces named by the caption style, or the first system
    /// font pair that exists when no regular face is configured.
    pub fn from_style(style: &CaptionStyle) -> Result<Self> {
        let (regular_path, bold_path) = match &style.font_path {
            Some(path) => (path.clone(), style.bold_font_path.clone()),
            None => {
                let (regular, bold) = find_system_fonts().ok_or(Error::NoFont)?;
                (regular, style.bold_font_path.clone().or(bold))
            }
        };

        let regular = Self::load_font(&regular_path)?;
        let bold = match bold_path {
            Some(path) => match Self::load_font(&path) {
                Ok(font) => Some(font),
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "Bold face unavailable");
                    None
                }
            },
            None => None,
        };
        debug!(
            regular = %regular_path.display(),
            has_bold = bold.is_some(),
            "Loaded caption fonts"
        );
        Ok(Self { regular, bold })
    }

    pub fn regular(&self) -> &Font {
        &self.regular
    }

    /// Bold face, the regular one when none was loaded
    pub fn bold(&self) -> &Font {
        self.bold.as_ref().unwrap_or(&self.regular)
    }
}

/// First existing (regular, bold) system font pair
pub fn find_system_fonts() -> Option<(PathBuf, Option<PathBuf>)> {
    SYSTEM_FONTS.iter().find_map(|(regular, bold)| {
        let regular = Path::new(regular);
        if !regular.is_file() {
            return None;
        }
        let bold = Path::new(bold);
        Some((
            regular.to_path_buf(),
            bold.is_file().then(|| bold.to_path_buf()),
        ))
    })
}

/// Width of `text` on one line, including kerning
pub fn measure(font: &Font, text: &str, px: f32) -> f32 {
    let mut width = 0.0;
    let mut previous = None;
    for ch in text.chars() {
        if let Some(kern) = previous.and_then(|p| font.horizontal_kern(p, ch, px)) {
            width += kern;
        }
        width += font.metrics(ch, px).advance_width;
        previous = Some(ch);
    }
    width
}

/// Vertical metrics of one line of text
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineMetrics {
    pub ascent: f32,
    pub height: f32,
}

pub fn line_metrics(font: &Font, px: f32) -> LineMetrics {
    match font.horizontal_line_metrics(px) {
        Some(metrics) => LineMetrics {
            ascent: metrics.ascent,
            height: metrics.new_line_size.max(metrics.ascent - metrics.descent),
        },
        None => LineMetrics {
            ascent: px * 0.8,
            height: px * 1.2,
        },
    }
}

/// Draws one line with its pen starting at `x` and its baseline at `baseline`
pub fn draw_line(
    image: &mut RgbaImage,
    font: &Font,
    text: &str,
    px: f32,
    x: f32,
    baseline: f32,
    color: Rgba8,
) {
    let mut pen = x;
    let mut previous = None;
    for ch in text.chars() {
        if let Some(kern) = previous.and_then(|p| font.horizontal_kern(p, ch, px)) {
            pen += kern;
        }
        let (metrics, coverage) = font.rasterize(ch, px);
        let left = (pen + metrics.xmin as f32).round() as i32;
        let top = (baseline - metrics.ymin as f32 - metrics.height as f32).round() as i32;

        for row in 0..metrics.height {
            for col in 0..metrics.width {
                let value = coverage[row * metrics.width + col];
                if value == 0 {
                    continue;
                }
                let dx = left + col as i32;
                let dy = top + row as i32;
                if dx < 0 || dy < 0 || dx >= image.width() as i32 || dy >= image.height() as i32 {
                    continue;
                }
                let pixel = image.get_pixel_mut(dx as u32, dy as u32);
                blend_pixel(pixel, color, value as f32 / 255.0);
            }
        }

        pen += metrics.advance_width;
        previous = Some(ch);
    }
}
