//! Reconnect backoff policy
//!
//! Deterministic exponential backoff: the n-th retry waits
//! `initial_delay * 2^n`, capped at `max_delay`. After `max_attempts`
//! consecutive failures the connection manager stops retrying and surfaces a
//! terminal give-up signal instead of hammering a degraded backend; a manual
//! `connect()` resets the count.

use std::time::Duration;

/// Reconnect schedule configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay before the first retry
    pub initial_delay: Duration,

    /// Upper bound on any retry delay
    pub max_delay: Duration,

    /// Consecutive failures tolerated before giving up
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(3),
            max_delay: Duration::from_secs(60),
            max_attempts: 10,
        }
    }
}

impl ReconnectPolicy {
    /// Create a policy with the default schedule
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the delay before the first retry
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the upper bound on retry delays
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set how many consecutive failures are tolerated
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Delay for the given 0-based retry index
    ///
    /// `delay_for_attempt(0)` is `initial_delay`; each subsequent attempt
    /// doubles the delay until `max_delay` caps it.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        // Cap the exponent so the shift cannot overflow; anything past 2^32
        // is far beyond any sane max_delay anyway.
        let exponent = attempt.min(32);
        let millis = (self.initial_delay.as_millis() as u64)
            .saturating_mul(1u64.checked_shl(exponent).unwrap_or(u64::MAX));
        Duration::from_millis(millis).min(self.max_delay)
    }

    /// Whether another attempt may be scheduled after `failures` consecutive failures
    pub fn has_attempts_remaining(&self, failures: u32) -> bool {
        failures < self.max_attempts
    }
}
