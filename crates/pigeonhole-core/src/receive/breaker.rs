//! Repeated-failures-over-time circuit breaker
//!
//! Tracks availability failures shared by all workers of one receiver. The
//! breaker arms on the first failure after a success. Once the armed period
//! reaches the configured window and at least `failure_threshold` failures
//! have been recorded, it opens and hands a [`CriticalError`] to the host
//! exactly once. A success closes it again.

use super::backoff::sleep_unless_cancelled;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Breaker tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Name used in logs and escalations
    pub name: String,
    /// How long failures must persist without a success before escalating
    pub window: Duration,
    /// Sleep after every recorded failure, slowing down restart loops
    pub delay_after_failure: Duration,
    /// Minimum number of failures before escalating
    pub failure_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            name: "PigeonholeConnectivity".to_string(),
            window: Duration::from_secs(120),
            delay_after_failure: Duration::from_secs(10),
            failure_threshold: 1,
        }
    }
}

/// Sustained unavailability, reported to the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CriticalError {
    pub breaker: String,
    pub failures: u32,
    pub elapsed: Duration,
    pub last_error: String,
}

impl fmt::Display for CriticalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} repeated failures reaching the working root over {:?}; last error: {}",
            self.breaker, self.failures, self.elapsed, self.last_error
        )
    }
}

/// Host callback for critical escalations. Advisory; the receiver keeps running.
pub type CriticalErrorHandler = Arc<dyn Fn(&CriticalError) + Send + Sync>;

#[derive(Debug, Default)]
struct BreakerState {
    failures: u32,
    armed_at: Option<Instant>,
    open: bool,
}

pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: Mutex<BreakerState>,
    on_critical: CriticalErrorHandler,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig, on_critical: CriticalErrorHandler) -> Self {
        Self {
            config,
            state: Mutex::new(BreakerState::default()),
            on_critical,
        }
    }

    /// Record a successful cycle, closing the breaker.
    pub fn success(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.failures == 0 {
            return;
        }
        if state.open {
            info!("{}: working root reachable again", self.config.name);
        } else {
            debug!(
                "{}: reset after {} failure(s)",
                self.config.name, state.failures
            );
        }
        *state = BreakerState::default();
    }

    /// Record an availability failure, escalating if it has persisted.
    ///
    /// Blocks for `delay_after_failure` before returning.
    pub fn failure(&self, cause: &dyn fmt::Display) {
        self.record_failure(cause);
        if !self.config.delay_after_failure.is_zero() {
            std::thread::sleep(self.config.delay_after_failure);
        }
    }

    /// Like [`failure`](Self::failure), but the delay ends early once
    /// `cancel` fires.
    pub fn failure_unless_cancelled(
        &self,
        cause: &dyn fmt::Display,
        cancel: &CancellationToken,
    ) {
        self.record_failure(cause);
        sleep_unless_cancelled(self.config.delay_after_failure, cancel);
    }

    fn record_failure(&self, cause: &dyn fmt::Display) {
        let escalation = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.failures = state.failures.saturating_add(1);
            let armed_at = *state.armed_at.get_or_insert_with(Instant::now);
            let elapsed = armed_at.elapsed();

            if !state.open
                && state.failures >= self.config.failure_threshold
                && elapsed >= self.config.window
            {
                state.open = true;
                Some(CriticalError {
                    breaker: self.config.name.clone(),
                    failures: state.failures,
                    elapsed,
                    last_error: cause.to_string(),
                })
            } else {
                None
            }
        };

        if let Some(critical) = escalation {
            error!("{critical}");
            (self.on_critical)(&critical);
        }
    }

    /// Failures recorded since the last success.
    pub fn failure_count(&self) -> u32 {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .failures
    }

    /// Whether an escalation has fired since the last success.
    pub fn is_open(&self) -> bool {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).open
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("config", &self.config)
            .field("failures", &self.failure_count())
            .finish_non_exhaustive()
    }
}
