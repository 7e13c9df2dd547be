//! Runs a transform on a dedicated thread behind start and completion gates
//!
//! The transform thread fires the start gate once setup succeeds or fails,
//! and fires the completion gate once with the final outcome. A start failure
//! fires only the start gate. The waiting side polls in short ticks so that a
//! deadline or a caller cancellation is noticed promptly.

use crate::gate::{one_shot, CancelToken, Gate, OneShot};
use crate::job::{TransformJob, TransformOutcome, Transformer};
use crate::{Error, Result};
use crossbeam_channel::RecvTimeoutError;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

const DEFAULT_TICK: Duration = Duration::from_millis(50);

/// Why a wait ended without an outcome
#[derive(Debug)]
pub enum WaitError {
    /// The caller's token was cancelled while waiting
    Interrupted,
    /// The deadline passed before the gate fired
    TimedOut,
    /// The start gate reported a failure
    StartFailed(Error),
    /// The transform thread went away without firing
    Lost(Error),
}

/// Spawns transform threads for one transformer
pub struct TransformRunner {
    transformer: Arc<dyn Transformer>,
    tick: Duration,
}

impl TransformRunner {
    pub fn new(transformer: Arc<dyn Transformer>) -> Self {
        Self {
            transformer,
            tick: DEFAULT_TICK,
        }
    }

    /// Sets how often waits check the deadline and the caller token
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick.max(Duration::from_millis(1));
        self
    }

    /// Starts `job` on a new `overlay-transformer` thread
    pub fn spawn(&self, job: TransformJob) -> Result<TransformHandle> {
        let (start_shot, started) = one_shot();
        let (done_shot, completed) = one_shot();
        let cancel = CancelToken::new();

        let transformer = Arc::clone(&self.transformer);
        let thread_cancel = cancel.clone();
        let thread = thread::Builder::new()
            .name("overlay-transformer".to_string())
            .spawn(move || run_transform(transformer.as_ref(), job, &thread_cancel, start_shot, done_shot))?;

        Ok(TransformHandle {
            started,
            completed,
            cancel,
            thread: Some(thread),
            tick: self.tick,
        })
    }
}

fn run_transform(
    transformer: &dyn Transformer,
    job: TransformJob,
    cancel: &CancelToken,
    start_shot: OneShot<Result<()>>,
    done_shot: OneShot<TransformOutcome>,
) {
    let begun = Instant::now();
    let layers = job.overlays.len();
    let active = match transformer.start(job) {
        Ok(active) => {
            debug!(layers, "Transform started");
            start_shot.fire(Ok(()));
            active
        }
        Err(e) => {
            error!(error = %e, "Transform failed to start");
            start_shot.fire(Err(e));
            return;
        }
    };

    let outcome = match active.run(cancel) {
        Ok(report) => {
            let duration_ms = begun.elapsed().as_millis() as u64;
            info!(duration_ms, frames = report.frames, "Transform completed");
            TransformOutcome::Success {
                duration_ms,
                frames: report.frames,
            }
        }
        Err(e) => {
            error!(error = %e, "Transform failed");
            TransformOutcome::Failure(e)
        }
    };
    done_shot.fire(outcome);
}

/// Waiting side of a running transform
pub struct TransformHandle {
    started: Gate<Result<()>>,
    completed: Gate<TransformOutcome>,
    cancel: CancelToken,
    thread: Option<JoinHandle<()>>,
    tick: Duration,
}

impl TransformHandle {
    /// Token observed by the transform thread
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Asks the transform to stop
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Waits for the start gate
    pub fn wait_started(&self, deadline: Instant, caller: &CancelToken) -> std::result::Result<(), WaitError> {
        match self.wait_gate(&self.started, deadline, caller, "start")? {
            Ok(()) => Ok(()),
            Err(e) => Err(WaitError::StartFailed(e)),
        }
    }

    /// Waits for the completion gate
    pub fn wait_completed(
        &self,
        deadline: Instant,
        caller: &CancelToken,
    ) -> std::result::Result<TransformOutcome, WaitError> {
        self.wait_gate(&self.completed, deadline, caller, "completion")
    }

    /// Waits for both gates in order against one deadline
    pub fn wait(&self, deadline: Instant, caller: &CancelToken) -> std::result::Result<TransformOutcome, WaitError> {
        self.wait_started(deadline, caller)?;
        self.wait_completed(deadline, caller)
    }

    fn wait_gate<T>(
        &self,
        gate: &Gate<T>,
        deadline: Instant,
        caller: &CancelToken,
        name: &'static str,
    ) -> std::result::Result<T, WaitError> {
        loop {
            if caller.is_cancelled() {
                self.cancel.cancel();
                return Err(WaitError::Interrupted);
            }
            let now = Instant::now();
            if now >= deadline {
                self.cancel.cancel();
                return Err(WaitError::TimedOut);
            }
            match gate.wait_timeout(self.tick.min(deadline - now)) {
                Ok(value) => return Ok(value),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return Err(WaitError::Lost(Error::Disconnected(name))),
            }
        }
    }

    /// Cancels the transform and waits up to `grace` for its thread to exit.
    ///
    /// Returns whether the thread was joined. A thread still running after
    /// the grace period is detached.
    pub fn shutdown(mut self, grace: Duration) -> bool {
        self.cancel.cancel();
        let Some(thread) = self.thread.take() else {
            return true;
        };
        let deadline = Instant::now() + grace;
        while !thread.is_finished() {
            if Instant::now() >= deadline {
                warn!(grace_ms = grace.as_millis() as u64, "Transform thread did not stop in time, detaching");
                return false;
            }
            thread::sleep(self.tick.min(Duration::from_millis(10)));
        }
        if thread.join().is_err() {
            warn!("Transform thread panicked");
        }
        true
    }
}

impl Drop for TransformHandle {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.cancel.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{ActiveTransform, TransformReport};
    use crate::EncoderSettings;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Clone, Copy)]
    enum Behavior {
        Succeed,
        RejectStart,
        FailRun,
        /// Runs until cancelled
        Hang,
        /// Ignores cancellation for the given time
        Stubborn(Duration),
        Panic,
    }

    struct Fake {
        behavior: Behavior,
        saw_cancel: Arc<AtomicBool>,
    }

    impl Fake {
        fn new(behavior: Behavior) -> Self {
            Self {
                behavior,
                saw_cancel: Arc::new(AtomicBool::new(false)),
            }
        }
    }

    struct FakeRun {
        behavior: Behavior,
        saw_cancel: Arc<AtomicBool>,
    }

    impl Transformer for Fake {
        fn start(&self, _job: TransformJob) -> Result<Box<dyn ActiveTransform>> {
            if let Behavior::RejectStart = self.behavior {
                return Err(Error::Failed("bad source".into()));
            }
            Ok(Box::new(FakeRun {
                behavior: self.behavior,
                saw_cancel: Arc::clone(&self.saw_cancel),
            }))
        }
    }

    impl ActiveTransform for FakeRun {
        fn run(self: Box<Self>, cancel: &CancelToken) -> Result<TransformReport> {
            match self.behavior {
                Behavior::Succeed | Behavior::RejectStart => Ok(TransformReport { frames: 3 }),
                Behavior::FailRun => Err(Error::Failed("encoder crashed".into())),
                Behavior::Hang => {
                    while !cancel.is_cancelled() {
                        thread::sleep(Duration::from_millis(5));
                    }
                    self.saw_cancel.store(true, Ordering::SeqCst);
                    Err(Error::Cancelled)
                }
                Behavior::Stubborn(delay) => {
                    thread::sleep(delay);
                    Err(Error::Cancelled)
                }
                Behavior::Panic => panic!("transform blew up"),
            }
        }
    }

    fn job() -> TransformJob {
        TransformJob::new(
            "in.mp4",
            "out.mp4",
            EncoderSettings::h264_aac(64, 64),
            Arc::from(Vec::new()),
        )
    }

    fn runner(fake: Fake) -> TransformRunner {
        TransformRunner::new(Arc::new(fake)).with_tick(Duration::from_millis(5))
    }

    fn soon(ms: u64) -> Instant {
        Instant::now() + Duration::from_millis(ms)
    }

    #[test]
    fn test_success_reports_through_both_gates() {
        let handle = runner(Fake::new(Behavior::Succeed)).spawn(job()).unwrap();
        let outcome = handle.wait(soon(5_000), &CancelToken::new()).unwrap();
        assert!(matches!(outcome, TransformOutcome::Success { frames: 3, .. }));
        assert!(handle.shutdown(Duration::from_secs(5)));
    }

    #[test]
    fn test_start_failure_fires_only_start_gate() {
        let handle = runner(Fake::new(Behavior::RejectStart)).spawn(job()).unwrap();
        let caller = CancelToken::new();
        match handle.wait_started(soon(5_000), &caller) {
            Err(WaitError::StartFailed(Error::Failed(msg))) => assert_eq!(msg, "bad source"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            handle.wait_completed(soon(5_000), &caller),
            Err(WaitError::Lost(Error::Disconnected("completion")))
        ));
        assert!(handle.shutdown(Duration::from_secs(5)));
    }

    #[test]
    fn test_run_failure_arrives_as_outcome() {
        let handle = runner(Fake::new(Behavior::FailRun)).spawn(job()).unwrap();
        let outcome = handle.wait(soon(5_000), &CancelToken::new()).unwrap();
        assert!(matches!(outcome, TransformOutcome::Failure(Error::Failed(_))));
        handle.shutdown(Duration::from_secs(5));
    }

    #[test]
    fn test_deadline_cancels_transform() {
        let fake = Fake::new(Behavior::Hang);
        let saw_cancel = Arc::clone(&fake.saw_cancel);
        let handle = runner(fake).spawn(job()).unwrap();

        assert!(matches!(
            handle.wait(soon(50), &CancelToken::new()),
            Err(WaitError::TimedOut)
        ));
        assert!(handle.cancel_token().is_cancelled());
        assert!(handle.shutdown(Duration::from_secs(5)));
        assert!(saw_cancel.load(Ordering::SeqCst));
    }

    #[test]
    fn test_caller_cancellation_interrupts_wait() {
        let handle = runner(Fake::new(Behavior::Hang)).spawn(job()).unwrap();
        let caller = CancelToken::new();
        let remote = caller.clone();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            remote.cancel();
        });

        assert!(matches!(
            handle.wait(soon(10_000), &caller),
            Err(WaitError::Interrupted)
        ));
        assert!(caller.is_cancelled());
        assert!(handle.cancel_token().is_cancelled());
        assert!(handle.shutdown(Duration::from_secs(5)));
        canceller.join().unwrap();
    }

    #[test]
    fn test_shutdown_detaches_after_grace() {
        let handle = runner(Fake::new(Behavior::Stubborn(Duration::from_millis(500))))
            .spawn(job())
            .unwrap();
        handle.wait_started(soon(5_000), &CancelToken::new()).unwrap();
        assert!(!handle.shutdown(Duration::from_millis(20)));
    }

    #[test]
    fn test_panicking_transform_is_lost() {
        let handle = runner(Fake::new(Behavior::Panic)).spawn(job()).unwrap();
        assert!(matches!(
            handle.wait(soon(5_000), &CancelToken::new()),
            Err(WaitError::Lost(_))
        ));
        assert!(handle.shutdown(Duration::from_secs(5)));
    }
}
