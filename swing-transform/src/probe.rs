//! Video probing using FFmpeg

use crate::job::Prober;
use crate::{Error, Result};
use ffmpeg_next as ffmpeg;
use std::path::Path;
use std::sync::OnceLock;
use swing_core::VideoInfo;
use tracing::debug;

static FFMPEG_INIT: OnceLock<std::result::Result<(), ffmpeg::Error>> = OnceLock::new();

/// Initialize FFmpeg once per process
pub(crate) fn init_ffmpeg() -> Result<()> {
    let init = FFMPEG_INIT.get_or_init(|| {
        ffmpeg::init()?;
        ffmpeg::util::log::set_level(ffmpeg::util::log::Level::Error);
        Ok(())
    });
    match init {
        Ok(()) => Ok(()),
        Err(e) => Err(Error::Failed(format!("FFmpeg initialization failed: {e}"))),
    }
}

/// Reads width, height and bitrate of the best video stream
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegProber;

impl Prober for FfmpegProber {
    fn probe(&self, path: &Path) -> Result<VideoInfo> {
        init_ffmpeg()?;

        let input = ffmpeg::format::input(&path)?;
        let stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| Error::NoVideoStream(path.to_path_buf()))?;

        let context = ffmpeg::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = context.decoder().video()?;

        // Stream bitrate first, container bitrate as fallback
        let stream_bitrate = decoder.bit_rate() as u64;
        let bitrate = if stream_bitrate > 0 {
            stream_bitrate
        } else {
            input.bit_rate().max(0) as u64
        };

        let info = VideoInfo::new(decoder.width(), decoder.height(), bitrate);
        debug!(
            path = %path.display(),
            width = info.width,
            height = info.height,
            bitrate = info.bitrate,
            "Probed video"
        );
        Ok(info)
    }
}
