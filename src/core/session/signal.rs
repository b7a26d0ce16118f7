//! Single-slot rendezvous signal.
//!
//! A [`Signal`] holds at most one pending wake-up. [`Signal::set`] stores it (setting an
//! already-set signal is a no-op), and [`Signal::wait`] consumes it, clearing the slot
//! before returning. A `set` that lands before the matching `wait` is entered is kept in
//! the slot, so the waiter never misses it.
//!
//! Callers that must ignore wake-ups from an earlier turn call [`Signal::clear`] *before*
//! issuing the action they are about to wait on, never between issuing and waiting.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Reasons a wait on a [`Signal`] ended without the signal being set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SignalError {
    /// The owning call session was torn down while waiting
    #[error("wait cancelled: call session removed")]
    Cancelled,

    /// The bound passed to [`Signal::wait_timeout`] elapsed
    #[error("wait timed out after {0:?}")]
    TimedOut(Duration),
}

/// Binary wait/notify primitive with clear-on-consume semantics.
#[derive(Debug, Default)]
pub struct Signal {
    ready: AtomicBool,
    notify: Notify,
}

impl Signal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the signal ready and wake the waiter, if any.
    pub fn set(&self) {
        if !self.ready.swap(true, Ordering::AcqRel) {
            self.notify.notify_one();
        }
    }

    /// Drop any pending wake-up.
    pub fn clear(&self) {
        self.ready.store(false, Ordering::Release);
    }

    /// Whether a wake-up is pending.
    pub fn is_set(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Suspend until the signal is set, then clear it.
    ///
    /// Returns [`SignalError::Cancelled`] as soon as `cancel` fires.
    pub async fn wait(&self, cancel: &CancellationToken) -> Result<(), SignalError> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register interest before checking the flag so a concurrent `set` is not lost.
            notified.as_mut().enable();

            if self.ready.swap(false, Ordering::AcqRel) {
                return Ok(());
            }

            tokio::select! {
                _ = &mut notified => {}
                _ = cancel.cancelled() => return Err(SignalError::Cancelled),
            }
        }
    }

    /// [`Signal::wait`] bounded by `timeout`.
    pub async fn wait_timeout(
        &self,
        cancel: &CancellationToken,
        timeout: Duration,
    ) -> Result<(), SignalError> {
        match tokio::time::timeout(timeout, self.wait(cancel)).await {
            Ok(result) => result,
            Err(_) => Err(SignalError::TimedOut(timeout)),
        }
    }
}
