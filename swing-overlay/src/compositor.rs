//! Overlay compositor
//!
//! Orchestrates one request end to end: input checks, passthrough copies,
//! probing, building the avatar and caption layers, running the transform
//! behind its gates with a bounded wait, and validating what it wrote.
//! Avatar and caption failures are decorative: the layer is left out and
//! the run continues.

use crate::validate::{remove_partial, validate_output};
use crate::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use swing_core::{geometry, OverlayConfig, OverlayRequest, VideoInfo};
use swing_raster::{AvatarRasterizer, CaptionRasterizer};
use swing_transform::{
    CancelToken, EncoderSettings, LayerKind, OverlayLayer, Prober, TransformJob, TransformOutcome,
    TransformRunner, Transformer, WaitError,
};
use tracing::{debug, error, info, warn};

/// Burns overlays into videos, one request at a time
pub struct OverlayCompositor {
    config: OverlayConfig,
    prober: Arc<dyn Prober>,
    runner: TransformRunner,
    avatar: AvatarRasterizer,
    caption: CaptionRasterizer,
}

impl OverlayCompositor {
    /// Creates a compositor over the given collaborators
    pub fn new(config: OverlayConfig, prober: Arc<dyn Prober>, transformer: Arc<dyn Transformer>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            avatar: AvatarRasterizer::new(&config.avatar),
            caption: CaptionRasterizer::new(config.clone()),
            runner: TransformRunner::new(transformer),
            prober,
            config,
        })
    }

    /// Creates a compositor backed by FFmpeg
    #[cfg(feature = "ffmpeg")]
    pub fn with_ffmpeg(config: OverlayConfig) -> Result<Self> {
        Self::new(
            config,
            Arc::new(swing_transform::FfmpegProber),
            Arc::new(swing_transform::FfmpegTransformer::default()),
        )
    }

    pub fn with_avatar_rasterizer(mut self, avatar: AvatarRasterizer) -> Self {
        self.avatar = avatar;
        self
    }

    pub fn with_caption_rasterizer(mut self, caption: CaptionRasterizer) -> Self {
        self.caption = caption;
        self
    }

    /// Replaces the transform runner, e.g. to shorten its polling tick
    pub fn with_runner(mut self, runner: TransformRunner) -> Self {
        self.runner = runner;
        self
    }

    pub fn config(&self) -> &OverlayConfig {
        &self.config
    }

    /// Processes `request` and returns the path of the written output.
    ///
    /// `cancel` interrupts a transform wait; it stays cancelled afterwards.
    pub fn process(&self, request: &OverlayRequest, cancel: &CancelToken) -> Result<PathBuf> {
        let input = request.input_path.as_path();
        let output = request.output_path.as_path();
        let begun = Instant::now();
        info!(
            input = %input.display(),
            output = %output.display(),
            avatar = request.attach_avatar,
            caption = request.caption().is_some(),
            "Processing video"
        );

        if !input.is_file() {
            error!(input = %input.display(), "Input video not found");
            return Err(Error::InputMissing(input.to_path_buf()));
        }

        if request.is_passthrough() {
            copy_verbatim(input, output)?;
            info!(output = %output.display(), "No overlays requested, copied input");
            return Ok(output.to_path_buf());
        }

        let video = self.probe(input)?;
        let layers = self.build_layers(request, &video);
        if layers.is_empty() {
            warn!(input = %input.display(), "No overlay could be built, copying input");
            copy_verbatim(input, output)?;
            return Ok(output.to_path_buf());
        }

        if same_file(input, output) {
            error!(path = %input.display(), "Refusing to transform a video onto itself");
            return Err(Error::OutputIsInput(output.to_path_buf()));
        }
        prepare_output(output)?;
        let layers: Arc<[OverlayLayer]> = layers.into();
        let settings = EncoderSettings::h264_aac(video.width, video.height)
            .with_target_bitrate(video.target_bitrate())
            .with_video_encoder(self.config.transform.video_encoder.as_str());
        let job = TransformJob::new(input, output, settings, Arc::clone(&layers));

        let transformed = self.run_transform(job, cancel);
        drop(layers);
        if let Err(e) = transformed {
            remove_partial(output);
            error!(output = %output.display(), error = %e, "Overlay failed");
            return Err(e);
        }

        validate_output(output, self.prober.as_ref())?;
        info!(
            output = %output.display(),
            elapsed_ms = begun.elapsed().as_millis() as u64,
            "Overlay complete"
        );
        Ok(output.to_path_buf())
    }

    fn probe(&self, input: &Path) -> Result<VideoInfo> {
        let geometry_unknown = |reason: String| Error::GeometryUnknown {
            path: input.to_path_buf(),
            reason,
        };
        let video = self
            .prober
            .probe(input)
            .map_err(|e| geometry_unknown(e.to_string()))?
            .validated()
            .map_err(|e| geometry_unknown(e.to_string()))?;
        debug!(
            width = video.width,
            height = video.height,
            bitrate = video.bitrate,
            "Input probed"
        );
        Ok(video)
    }

    fn build_layers(&self, request: &OverlayRequest, video: &VideoInfo) -> Vec<OverlayLayer> {
        let mut layers = Vec::with_capacity(2);

        if request.attach_avatar {
            match request.avatar() {
                Some(path) => layers.extend(self.avatar_layer(path, video)),
                None => warn!("Avatar requested without an image path"),
            }
        }
        if let Some(text) = request.caption() {
            layers.extend(self.caption_layer(text, video));
        }
        layers
    }

    fn avatar_layer(&self, path: &Path, video: &VideoInfo) -> Option<OverlayLayer> {
        if !path.is_file() {
            warn!(path = %path.display(), "Avatar image not found, skipping");
            return None;
        }
        let size = geometry::avatar_size(&self.config, video);
        let badge = self.avatar.build(path, size)?;
        let placement = geometry::avatar_placement(&self.config, video, badge.width(), badge.height());
        debug!(
            size,
            anchor_x = placement.background_anchor.x,
            anchor_y = placement.background_anchor.y,
            "Avatar layer built"
        );
        Some(OverlayLayer::new(LayerKind::Avatar, badge, placement))
    }

    fn caption_layer(&self, text: &str, video: &VideoInfo) -> Option<OverlayLayer> {
        let card = self.caption.build(text, video.width, video.height)?;
        let placement = geometry::caption_placement(&self.config, video, card.width(), card.height());
        debug!(
            width = card.width(),
            height = card.height(),
            anchor_y = placement.background_anchor.y,
            "Caption layer built"
        );
        Some(OverlayLayer::new(LayerKind::Caption, card, placement))
    }

    /// Runs the job with a bounded wait; the transform thread is always torn down
    fn run_transform(&self, job: TransformJob, cancel: &CancelToken) -> Result<()> {
        let timeout = self.config.transform.timeout();
        let deadline = Instant::now() + timeout;
        let handle = self.runner.spawn(job)?;

        let result = match handle.wait(deadline, cancel) {
            Ok(TransformOutcome::Success { duration_ms, frames }) => {
                debug!(duration_ms, frames, "Transform reported success");
                Ok(())
            }
            Ok(TransformOutcome::Failure(e)) => Err(Error::TransformFailure(e)),
            Err(WaitError::StartFailed(e)) | Err(WaitError::Lost(e)) => Err(Error::TransformFailure(e)),
            Err(WaitError::TimedOut) => Err(Error::TransformTimeout(timeout)),
            Err(WaitError::Interrupted) => {
                cancel.cancel();
                Err(Error::InterruptedWait)
            }
        };

        let grace = self.config.transform.shutdown_grace();
        if !handle.shutdown(grace) {
            warn!(grace_ms = grace.as_millis() as u64, "Transform thread left running");
        }
        result
    }
}

/// Creates the parent directory and removes a stale output
fn prepare_output(output: &Path) -> Result<()> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    remove_partial(output);
    Ok(())
}

/// Byte-for-byte copy of the input to the output location
fn copy_verbatim(input: &Path, output: &Path) -> Result<()> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    if same_file(input, output) {
        debug!(path = %input.display(), "Input and output are the same file");
        return Ok(());
    }
    let bytes = fs::copy(input, output)?;
    debug!(bytes, output = %output.display(), "Copied input verbatim");
    Ok(())
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
