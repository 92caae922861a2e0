// Connection and retry state
//
// ConnectionState and RetryState are owned exclusively by the connection
// manager; everything else only observes them through its signals.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Lifecycle state of the single stream session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No stream open and none wanted (initial, intentional, or retries exhausted)
    Disconnected,
    /// An open attempt is in flight
    Connecting,
    /// Stream is open and delivering frames
    Connected,
    /// Waiting out a backoff delay before the next attempt
    Reconnecting,
    /// Closed because the app stayed backgrounded past the grace period
    Suspended,
}

impl ConnectionState {
    /// True while an attempt is in flight or scheduled
    pub fn is_connecting(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::Reconnecting
        )
    }

    /// True while the stream is open
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    /// States in which a stream is open or being pursued
    pub fn is_active(&self) -> bool {
        self.is_connected() || self.is_connecting()
    }
}

/// Consecutive-failure accounting for the reconnect schedule
///
/// Reset on every successful transition into `Connected`; incremented on
/// every failed or aborted connection attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryState {
    /// Number of consecutive failed attempts
    pub attempt_count: u32,
    /// Delay used for the most recently scheduled retry
    pub last_delay: Duration,
}

impl RetryState {
    /// Fresh state with no recorded failures
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failed attempt and the delay scheduled for it
    pub fn record_failure(&mut self, delay: Duration) {
        self.attempt_count += 1;
        self.last_delay = delay;
    }

    /// Reset on successful connection or manual reconnect
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Which stream subscription flavor to open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamRole {
    Student,
    Tutor,
}

impl StreamRole {
    /// Wire value used as the `role` query parameter
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamRole::Student => "student",
            StreamRole::Tutor => "tutor",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_state_accounting() {
        let mut retry = RetryState::new();
        assert_eq!(retry.attempt_count, 0);

        retry.record_failure(Duration::from_secs(3));
        retry.record_failure(Duration::from_secs(6));
        assert_eq!(retry.attempt_count, 2);
        assert_eq!(retry.last_delay, Duration::from_secs(6));

        retry.reset();
        assert_eq!(retry, RetryState::default());
    }

    #[test]
    fn test_state_predicates() {
        assert!(ConnectionState::Connected.is_connected());
        assert!(ConnectionState::Connecting.is_connecting());
        assert!(ConnectionState::Reconnecting.is_connecting());
        assert!(!ConnectionState::Suspended.is_active());
        assert!(!ConnectionState::Disconnected.is_active());
    }
}
