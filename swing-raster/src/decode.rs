//! Bounded-memory image decoding

use crate::{Error, Result};
use image::imageops::{self, FilterType};
use image::{ImageError, ImageFormat, ImageReader, Limits, RgbaImage};
use jpeg_decoder::PixelFormat;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::debug;

/// Smallest power of two `factor` such that `min_side / factor <= 2 * target`
pub fn sample_factor(min_side: u32, target: u32) -> u32 {
    let limit = target.max(1).saturating_mul(2);
    let mut factor = 1u32;
    while min_side / factor > limit {
        factor *= 2;
    }
    factor
}

/// Reads only the pixel bounds of an image file
pub fn probe_dimensions(path: &Path) -> Result<(u32, u32)> {
    let (width, height) = ImageReader::open(path)?
        .with_guessed_format()?
        .into_dimensions()
        .map_err(|_| Error::UnreadableBounds {
            path: path.to_path_buf(),
        })?;
    if width == 0 || height == 0 {
        return Err(Error::UnreadableBounds {
            path: path.to_path_buf(),
        });
    }
    Ok((width, height))
}

/// Decodes `path` to RGBA, reduced so its shorter side is at most
/// `2 * target` (by a power-of-two factor).
///
/// JPEGs are decoded directly at the reduced size, so their footprint
/// follows the sampled image rather than the full photo. Other formats are
/// decoded whole and then reduced. Either way the decoded pixels are capped
/// at `budget_bytes`; going over reports [`Error::DecodeBudget`] instead of
/// exhausting memory.
pub fn decode_sampled(path: &Path, target: u32, budget_bytes: u64) -> Result<RgbaImage> {
    let (width, height) = probe_dimensions(path)?;
    let factor = sample_factor(width.min(height), target);
    let sampled = ((width / factor).max(1), (height / factor).max(1));
    debug!(
        path = %path.display(),
        width,
        height,
        target,
        factor,
        "Decoding sampled image"
    );

    let reader = ImageReader::open(path)?.with_guessed_format()?;
    if reader.format() == Some(ImageFormat::Jpeg) {
        drop(reader);
        return decode_jpeg_scaled(path, sampled, budget_bytes);
    }
    decode_whole(reader, path, sampled, factor, budget_bytes)
}

/// Full decode under an allocation limit, then a power-of-two reduction
fn decode_whole(
    mut reader: ImageReader<BufReader<File>>,
    path: &Path,
    (width, height): (u32, u32),
    factor: u32,
    budget_bytes: u64,
) -> Result<RgbaImage> {
    let mut limits = Limits::default();
    limits.max_alloc = Some(budget_bytes);
    reader.limits(limits);

    let decoded = reader.decode().map_err(|e| match e {
        ImageError::Limits(_) => over_budget(path, budget_bytes),
        other => Error::Image(other),
    })?;

    if factor == 1 {
        return Ok(decoded.into_rgba8());
    }
    let reduced = decoded.resize_exact(width, height, FilterType::Triangle);
    drop(decoded);
    Ok(reduced.into_rgba8())
}

/// Decodes a JPEG with DCT scaling to the nearest eighth at or above
/// `sampled`, then trims the remainder with a resize
fn decode_jpeg_scaled(path: &Path, (width, height): (u32, u32), budget_bytes: u64) -> Result<RgbaImage> {
    let mut decoder = jpeg_decoder::Decoder::new(BufReader::new(File::open(path)?));
    let requested = (to_u16(width), to_u16(height));
    let (out_width, out_height) = decoder.scale(requested.0, requested.1)?;
    let (out_width, out_height) = (u32::from(out_width), u32::from(out_height));

    // RGBA output is the largest buffer the decode produces
    let needed = u64::from(out_width) * u64::from(out_height) * 4;
    if needed > budget_bytes {
        return Err(over_budget(path, budget_bytes));
    }

    let pixels = decoder.decode()?;
    let format = decoder
        .info()
        .map(|info| info.pixel_format)
        .ok_or_else(|| Error::UnreadableBounds {
            path: path.to_path_buf(),
        })?;
    let rgba = jpeg_to_rgba(&pixels, format);
    drop(pixels);

    let image = RgbaImage::from_raw(out_width, out_height, rgba).ok_or_else(|| Error::UnreadableBounds {
        path: path.to_path_buf(),
    })?;
    debug!(out_width, out_height, "JPEG decoded at reduced scale");

    if image.dimensions() == (width, height) {
        return Ok(image);
    }
    Ok(imageops::resize(&image, width, height, FilterType::Triangle))
}

fn jpeg_to_rgba(pixels: &[u8], format: PixelFormat) -> Vec<u8> {
    match format {
        PixelFormat::L8 => pixels.iter().flat_map(|&l| [l, l, l, 255]).collect(),
        // big-endian samples, keep the high byte
        PixelFormat::L16 => pixels.chunks_exact(2).flat_map(|l| [l[0], l[0], l[0], 255]).collect(),
        PixelFormat::RGB24 => pixels.chunks_exact(3).flat_map(|p| [p[0], p[1], p[2], 255]).collect(),
        // Adobe CMYK comes out inverted
        PixelFormat::CMYK32 => pixels
            .chunks_exact(4)
            .flat_map(|p| {
                let k = u16::from(p[3]);
                let channel = |c: u8| ((u16::from(c) * k) / 255) as u8;
                [channel(p[0]), channel(p[1]), channel(p[2]), 255]
            })
            .collect(),
    }
}

fn to_u16(value: u32) -> u16 {
    u16::try_from(value).unwrap_or(u16::MAX)
}

fn over_budget(path: &Path, budget: u64) -> Error {
    Error::DecodeBudget {
        path: path.to_path_buf(),
        budget,
    }
}
