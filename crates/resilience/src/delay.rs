// crates/resilience/src/delay.rs
//! Cancellable scheduled delays
//!
//! Every sleep in this crate goes through [`ScheduledDelay`] rather than a
//! raw timer call, so cancellation has a single place to hook into.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// A scheduled delay that can be cancelled before it elapses
#[derive(Debug)]
pub struct ScheduledDelay {
    duration: Duration,
    cancel: Arc<Notify>,
}

/// Handle for cancelling a [`ScheduledDelay`]
#[derive(Debug, Clone)]
pub struct DelayHandle {
    cancel: Arc<Notify>,
}

impl DelayHandle {
    /// Cancels the associated delay. A cancellation issued before the delay
    /// starts waiting is not lost.
    pub fn cancel(&self) {
        self.cancel.notify_one();
    }
}

impl ScheduledDelay {
    /// Creates a delay of the given duration
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            cancel: Arc::new(Notify::new()),
        }
    }

    /// Returns a handle that can cancel this delay
    pub fn handle(&self) -> DelayHandle {
        DelayHandle {
            cancel: Arc::clone(&self.cancel),
        }
    }

    /// Gets the scheduled duration
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Waits out the delay. Returns true if it elapsed, false if cancelled.
    pub async fn wait(self) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(self.duration) => true,
            _ = self.cancel.notified() => false,
        }
    }
}

/// Suspends the current task for `duration`
pub async fn sleep_for(duration: Duration) {
    if duration.is_zero() {
        return;
    }
    ScheduledDelay::new(duration).wait().await;
}
