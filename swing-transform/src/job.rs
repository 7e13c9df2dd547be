//! Transform jobs and the collaborator traits that execute them

use crate::gate::CancelToken;
use crate::layer::OverlayLayer;
use crate::{EncoderSettings, Error, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use swing_core::VideoInfo;

/// Everything a transformer needs to produce one output file
#[derive(Debug, Clone)]
pub struct TransformJob {
    pub source: PathBuf,
    pub output: PathBuf,
    pub settings: EncoderSettings,
    /// Layers in drawing order; shared with the caller so it can release them after the run
    pub overlays: Arc<[OverlayLayer]>,
}

impl TransformJob {
    pub fn new(
        source: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        settings: EncoderSettings,
        overlays: Arc<[OverlayLayer]>,
    ) -> Self {
        Self {
            source: source.into(),
            output: output.into(),
            settings,
            overlays,
        }
    }

    /// Soundness checks shared by every transformer
    pub fn check(&self) -> Result<()> {
        if self.settings.width == 0 || self.settings.height == 0 {
            return Err(Error::InvalidJob(format!(
                "output size {}x{}",
                self.settings.width, self.settings.height
            )));
        }
        if self.source == self.output {
            return Err(Error::InvalidJob(format!(
                "output {} would overwrite its source",
                self.output.display()
            )));
        }
        Ok(())
    }
}

/// Summary of a finished transform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransformReport {
    pub frames: u64,
}

/// What the completion gate carries
#[derive(Debug)]
pub enum TransformOutcome {
    Success { duration_ms: u64, frames: u64 },
    Failure(Error),
}

/// Starts transforms.
///
/// `start` performs all setup that can be rejected up front; its error is the
/// start failure. The returned transform then runs to completion on the
/// calling thread.
pub trait Transformer: Send + Sync {
    fn start(&self, job: TransformJob) -> Result<Box<dyn ActiveTransform>>;
}

/// A started transform
pub trait ActiveTransform {
    /// Runs until the output is finished or `cancel` is set
    fn run(self: Box<Self>, cancel: &CancelToken) -> Result<TransformReport>;
}

/// Reads dimensions and bitrate from a video file
pub trait Prober: Send + Sync {
    fn probe(&self, path: &Path) -> Result<VideoInfo>;
}
