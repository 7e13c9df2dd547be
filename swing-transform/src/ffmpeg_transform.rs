//! FFmpeg-based overlay transform
//!
//! The flow per video frame:
//!   1. decode → swscale to RGBA
//!   2. blend every overlay layer in order
//!   3. swscale RGBA → YUV420P at the locked output size
//!   4. H.264 encode → mux
//!
//! An AAC audio stream is copied through untouched. Audio in any other codec
//! is dropped with a warning.

use crate::gate::CancelToken;
use crate::job::{ActiveTransform, TransformJob, TransformReport, Transformer};
use crate::layer::{composite_layers, LayerPosition, OverlayLayer};
use crate::probe::init_ffmpeg;
use crate::progress::ProgressTracker;
use crate::{Error, Result};
use ffmpeg_next as ffmpeg;
use ffmpeg::format::Pixel;
use ffmpeg::software::scaling;
use ffmpeg::util::frame::video::Video as VideoFrame;
use ffmpeg::{codec, encoder, Packet, Rational};
use image::RgbaImage;
use std::sync::Arc;
use tracing::{debug, info, warn};

const PROGRESS_INTERVAL: u64 = 250;

/// Encodes overlaid videos with FFmpeg
#[derive(Debug, Clone)]
pub struct FfmpegTransformer {
    /// x264 preset
    pub preset: String,
    /// Quality used when no bitrate is requested
    pub crf: u8,
}

impl Default for FfmpegTransformer {
    fn default() -> Self {
        Self {
            preset: "veryfast".to_string(),
            crf: 20,
        }
    }
}

impl Transformer for FfmpegTransformer {
    fn start(&self, job: TransformJob) -> Result<Box<dyn ActiveTransform>> {
        job.check()?;
        init_ffmpeg()?;
        Ok(Box::new(self.open(job)?))
    }
}

impl FfmpegTransformer {
    fn open(&self, job: TransformJob) -> Result<FfmpegRun> {
        let input = ffmpeg::format::input(&job.source)?;
        let mut output = ffmpeg::format::output(&job.output)?;

        // ── 1. Video decoder ──
        let (video_in, decoder, in_time_base, frame_rate, estimated_frames) = {
            let stream = input
                .streams()
                .best(ffmpeg::media::Type::Video)
                .ok_or_else(|| Error::NoVideoStream(job.source.clone()))?;
            let context = codec::context::Context::from_parameters(stream.parameters())?;
            let decoder = context.decoder().video()?;
            (
                stream.index(),
                decoder,
                stream.time_base(),
                stream.avg_frame_rate(),
                stream.frames().max(0) as u64,
            )
        };

        // ── 2. Video encoder ──
        let codec = encoder::find_by_name(&job.settings.video_encoder)
            .or_else(|| encoder::find(codec::Id::H264))
            .ok_or_else(|| Error::EncoderNotFound(job.settings.video_encoder.clone()))?;
        let encoder_name = codec.name().to_string();
        let (width, height) = job.settings.even_size();
        let global_header = output
            .format()
            .flags()
            .contains(ffmpeg::format::Flags::GLOBAL_HEADER);

        let context = codec::context::Context::from_parameters(codec::Parameters::new())?;
        let mut video = context.encoder().video()?;
        video.set_width(width);
        video.set_height(height);
        video.set_format(Pixel::YUV420P);
        video.set_time_base(in_time_base);
        video.set_frame_rate(decoder.frame_rate().or(Some(frame_rate)));
        if let Some(bitrate) = job.settings.target_bitrate {
            video.set_bit_rate(bitrate as usize);
        }
        if global_header {
            video.set_flags(codec::Flags::GLOBAL_HEADER);
        }

        let mut opts = ffmpeg::Dictionary::new();
        opts.set("threads", &num_cpus::get().to_string());
        if encoder_name == "libx264" {
            opts.set("preset", &self.preset);
            if job.settings.target_bitrate.is_none() {
                opts.set("crf", &self.crf.to_string());
            }
        }
        let encoder = video.open_as_with(codec, opts)?;

        let video_out = {
            let mut stream = output.add_stream(codec)?;
            stream.set_parameters(&encoder);
            stream.set_time_base(in_time_base);
            stream.index()
        };

        // ── 3. Audio passthrough ──
        let audio = match input.streams().best(ffmpeg::media::Type::Audio) {
            Some(stream) if stream.parameters().id() == codec::Id::AAC => {
                let mut out = output.add_stream(encoder::find(codec::Id::None))?;
                out.set_parameters(stream.parameters());
                // let the muxer choose the tag for its container
                unsafe {
                    (*out.parameters().as_mut_ptr()).codec_tag = 0;
                }
                Some(AudioCopy {
                    input: stream.index(),
                    output: out.index(),
                    in_time_base: stream.time_base(),
                    out_time_base: Rational(0, 1),
                })
            }
            Some(stream) => {
                warn!(codec = ?stream.parameters().id(), "Dropping non-AAC audio stream");
                None
            }
            None => None,
        };

        output.set_metadata(input.metadata().to_owned());
        output.write_header()?;

        // the muxer may have replaced the requested time bases
        let out_time_base = output
            .stream(video_out)
            .map(|s| s.time_base())
            .ok_or_else(|| Error::InvalidJob("video output stream vanished".into()))?;
        let audio = match audio {
            Some(mut copy) => {
                copy.out_time_base = output
                    .stream(copy.output)
                    .map(|s| s.time_base())
                    .ok_or_else(|| Error::InvalidJob("audio output stream vanished".into()))?;
                Some(copy)
            }
            None => None,
        };

        info!(
            source = %job.source.display(),
            output = %job.output.display(),
            encoder = %encoder_name,
            width,
            height,
            layers = job.overlays.len(),
            audio = audio.is_some(),
            "Transform opened"
        );

        Ok(FfmpegRun {
            input,
            output,
            video_in,
            audio,
            video: VideoPipeline {
                decoder,
                encoder,
                to_rgba: None,
                to_yuv: None,
                layers: job.overlays,
                positions: None,
                size: (width, height),
                video_out,
                in_time_base,
                out_time_base,
                progress: ProgressTracker::new(estimated_frames, "Frames"),
            },
        })
    }
}

struct AudioCopy {
    input: usize,
    output: usize,
    in_time_base: Rational,
    out_time_base: Rational,
}

struct FfmpegRun {
    input: ffmpeg::format::context::Input,
    output: ffmpeg::format::context::Output,
    video_in: usize,
    audio: Option<AudioCopy>,
    video: VideoPipeline,
}

impl ActiveTransform for FfmpegRun {
    fn run(self: Box<Self>, cancel: &CancelToken) -> Result<TransformReport> {
        let FfmpegRun {
            mut input,
            mut output,
            video_in,
            audio,
            mut video,
        } = *self;

        for (stream, mut packet) in input.packets() {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let index = stream.index();
            if index == video_in {
                video.decoder.send_packet(&packet)?;
                video.receive_frames(&mut output)?;
            } else if let Some(copy) = audio.as_ref().filter(|c| c.input == index) {
                packet.rescale_ts(copy.in_time_base, copy.out_time_base);
                packet.set_position(-1);
                packet.set_stream(copy.output);
                packet.write_interleaved(&mut output)?;
            }
        }

        video.decoder.send_eof()?;
        video.receive_frames(&mut output)?;
        video.encoder.send_eof()?;
        video.drain_encoder(&mut output)?;
        output.write_trailer()?;

        video.progress.finish();
        Ok(TransformReport {
            frames: video.progress.processed(),
        })
    }
}

struct VideoPipeline {
    decoder: ffmpeg::decoder::Video,
    encoder: ffmpeg::encoder::video::Encoder,
    to_rgba: Option<scaling::Context>,
    to_yuv: Option<scaling::Context>,
    layers: Arc<[OverlayLayer]>,
    /// Resolved on the first frame
    positions: Option<Vec<LayerPosition>>,
    size: (u32, u32),
    video_out: usize,
    in_time_base: Rational,
    out_time_base: Rational,
    progress: ProgressTracker,
}

impl VideoPipeline {
    fn receive_frames(&mut self, output: &mut ffmpeg::format::context::Output) -> Result<()> {
        let mut decoded = VideoFrame::empty();
        while self.decoder.receive_frame(&mut decoded).is_ok() {
            let yuv = self.overlay_frame(&decoded)?;
            self.encoder.send_frame(&yuv)?;
            self.drain_encoder(output)?;
            self.progress.increment_and_report(PROGRESS_INTERVAL);
        }
        Ok(())
    }

    fn overlay_frame(&mut self, decoded: &VideoFrame) -> Result<VideoFrame> {
        let (frame_width, frame_height) = (decoded.width(), decoded.height());

        if self.to_rgba.is_none() {
            debug!(frame_width, frame_height, format = ?decoded.format(), "First frame decoded");
            self.to_rgba = Some(scaling::Context::get(
                decoded.format(),
                frame_width,
                frame_height,
                Pixel::RGBA,
                frame_width,
                frame_height,
                scaling::Flags::BILINEAR,
            )?);
            self.to_yuv = Some(scaling::Context::get(
                Pixel::RGBA,
                frame_width,
                frame_height,
                Pixel::YUV420P,
                self.size.0,
                self.size.1,
                scaling::Flags::BILINEAR,
            )?);
        }
        let positions = self.positions.get_or_insert_with(|| {
            self.layers
                .iter()
                .map(|layer| layer.position(frame_width, frame_height))
                .collect()
        });

        let mut rgba = VideoFrame::empty();
        if let Some(scaler) = self.to_rgba.as_mut() {
            scaler.run(decoded, &mut rgba)?;
        }

        let mut image = frame_to_image(&rgba)?;
        composite_layers(&mut image, &self.layers, positions);
        image_to_frame(&image, &mut rgba);

        let mut yuv = VideoFrame::empty();
        if let Some(scaler) = self.to_yuv.as_mut() {
            scaler.run(&rgba, &mut yuv)?;
        }
        yuv.set_pts(decoded.timestamp());
        Ok(yuv)
    }

    fn drain_encoder(&mut self, output: &mut ffmpeg::format::context::Output) -> Result<()> {
        let mut packet = Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(self.video_out);
            packet.rescale_ts(self.in_time_base, self.out_time_base);
            packet.write_interleaved(output)?;
        }
        Ok(())
    }
}

/// Copies an RGBA frame into a tightly packed image, respecting the frame stride
fn frame_to_image(frame: &VideoFrame) -> Result<RgbaImage> {
    let (width, height) = (frame.width(), frame.height());
    let stride = frame.stride(0);
    let data = frame.data(0);
    let row_bytes = width as usize * 4;

    let mut buffer = Vec::with_capacity(row_bytes * height as usize);
    for y in 0..height as usize {
        let offset = y * stride;
        buffer.extend_from_slice(&data[offset..offset + row_bytes]);
    }
    RgbaImage::from_raw(width, height, buffer)
        .ok_or_else(|| Error::InvalidFrame(format!("{width}x{height} RGBA frame too short")))
}

/// Writes image rows back into an RGBA frame of the same size
fn image_to_frame(image: &RgbaImage, frame: &mut VideoFrame) {
    let stride = frame.stride(0);
    let row_bytes = image.width() as usize * 4;
    let src = image.as_raw();
    let dst = frame.data_mut(0);
    for y in 0..image.height() as usize {
        let src_off = y * row_bytes;
        let dst_off = y * stride;
        dst[dst_off..dst_off + row_bytes].copy_from_slice(&src[src_off..src_off + row_bytes]);
    }
}
