//! One-shot gates and cancellation tokens
//!
//! A gate is satisfied at most once: [`OneShot::fire`] consumes the sending
//! half, so a transform thread cannot report twice.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Sending half of a one-shot gate
#[derive(Debug)]
pub struct OneShot<T>(Sender<T>);

/// Waiting half of a one-shot gate
#[derive(Debug)]
pub struct Gate<T>(Receiver<T>);

/// Creates a connected one-shot gate
pub fn one_shot<T>() -> (OneShot<T>, Gate<T>) {
    let (sender, receiver) = bounded(1);
    (OneShot(sender), Gate(receiver))
}

impl<T> OneShot<T> {
    /// Satisfies the gate
    pub fn fire(self, value: T) {
        // the waiter may already have given up
        let _ = self.0.send(value);
    }
}

impl<T> Gate<T> {
    /// Waits up to `timeout` for the value.
    ///
    /// `Disconnected` means the sender was dropped without firing.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<T, RecvTimeoutError> {
        self.0.recv_timeout(timeout)
    }

    /// Blocks until the value arrives, `None` if the sender was dropped
    pub fn wait(&self) -> Option<T> {
        self.0.recv().ok()
    }

    pub fn try_take(&self) -> Option<T> {
        self.0.try_recv().ok()
    }
}

/// Shared cancellation flag
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
