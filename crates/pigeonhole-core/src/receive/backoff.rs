//! Adaptive delay between unproductive polls

use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Default first delay after an empty poll.
pub const DEFAULT_BASE: Duration = Duration::from_millis(50);

/// Default ceiling for the delay.
pub const DEFAULT_MAXIMUM: Duration = Duration::from_secs(10);

/// Longest stretch slept between cancellation checks.
const CANCEL_CHECK_INTERVAL: Duration = Duration::from_millis(10);

/// Per-worker backoff state.
///
/// Each unproductive poll sleeps for the current delay and then doubles it,
/// up to `maximum`. A productive poll resets the delay to `base` without
/// sleeping.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    maximum: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(base: Duration, maximum: Duration) -> Self {
        let maximum = maximum.max(base);
        Self {
            base,
            maximum,
            current: base,
        }
    }

    /// Delay the next unproductive poll would wait.
    pub fn current_delay(&self) -> Duration {
        self.current
    }

    /// Advance the state and return how long to wait, if at all.
    pub fn next_delay(&mut self, unproductive: bool) -> Option<Duration> {
        if !unproductive {
            self.current = self.base;
            return None;
        }

        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.maximum);
        Some(delay)
    }

    /// Block for the next delay if the poll was unproductive, returning
    /// early once `cancel` fires.
    pub fn wait(&mut self, unproductive: bool, cancel: &CancellationToken) {
        if let Some(delay) = self.next_delay(unproductive) {
            sleep_unless_cancelled(delay, cancel);
        }
    }
}

/// Sleep for `delay` or until `cancel` fires, whichever comes first.
///
/// Returns `false` if the sleep was cut short.
pub fn sleep_unless_cancelled(delay: Duration, cancel: &CancellationToken) -> bool {
    let deadline = Instant::now() + delay;
    loop {
        if cancel.is_cancelled() {
            return false;
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return true;
        }
        std::thread::sleep(remaining.min(CANCEL_CHECK_INTERVAL));
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(DEFAULT_BASE, DEFAULT_MAXIMUM)
    }
}
