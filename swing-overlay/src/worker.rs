//! Background worker that processes overlay requests one at a time

use crate::compositor::OverlayCompositor;
use crate::{Error, Result};
use crossbeam_channel::{unbounded, Sender};
use std::path::PathBuf;
use std::thread::{self, JoinHandle};
use swing_core::OverlayRequest;
use swing_transform::{one_shot, CancelToken, Gate, OneShot};
use tracing::{debug, info, warn};

struct Job {
    request: OverlayRequest,
    cancel: CancelToken,
    reply: OneShot<Result<PathBuf>>,
}

/// Runs a compositor on a dedicated `overlay-worker` thread.
///
/// Jobs are processed in submission order. Dropping the worker closes the
/// queue, lets queued jobs finish and joins the thread.
pub struct OverlayWorker {
    queue: Option<Sender<Job>>,
    thread: Option<JoinHandle<()>>,
}

impl OverlayWorker {
    pub fn spawn(compositor: OverlayCompositor) -> Result<Self> {
        let (queue, jobs) = unbounded::<Job>();
        let thread = thread::Builder::new()
            .name("overlay-worker".to_string())
            .spawn(move || {
                for job in jobs {
                    if job.cancel.is_cancelled() {
                        debug!(input = %job.request.input_path.display(), "Skipping job cancelled while queued");
                        job.reply.fire(Err(Error::InterruptedWait));
                        continue;
                    }
                    let result = compositor.process(&job.request, &job.cancel);
                    job.reply.fire(result);
                }
                debug!("Overlay worker stopped");
            })?;
        info!("Overlay worker started");

        Ok(Self {
            queue: Some(queue),
            thread: Some(thread),
        })
    }

    /// Queues a request
    pub fn submit(&self, request: OverlayRequest) -> JobTicket {
        let (reply, result) = one_shot();
        let cancel = CancelToken::new();
        let job = Job {
            request,
            cancel: cancel.clone(),
            reply,
        };
        // a closed queue drops the reply, which the ticket reports as WorkerGone
        if let Some(queue) = &self.queue {
            if queue.send(job).is_err() {
                warn!("Overlay worker queue closed");
            }
        }
        JobTicket { result, cancel }
    }
}

impl Drop for OverlayWorker {
    fn drop(&mut self) {
        self.queue.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Overlay worker panicked");
            }
        }
    }
}

/// Handle to one submitted request
pub struct JobTicket {
    result: Gate<Result<PathBuf>>,
    cancel: CancelToken,
}

impl JobTicket {
    /// Blocks until the request finishes
    pub fn wait(self) -> Result<PathBuf> {
        self.result.wait().unwrap_or_else(|| Err(Error::WorkerGone))
    }

    /// Cancels the request, queued or running
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }
}
