//! Connection manager configuration

use std::time::Duration;

use crate::backoff::ReconnectPolicy;
use crate::visibility::VisibilityPolicy;

/// Configuration for the connection manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Reconnect schedule applied after stream failures
    pub reconnect: ReconnectPolicy,

    /// How long a backgrounded connection is kept open before suspension
    pub hidden_grace: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            reconnect: ReconnectPolicy::default(),
            hidden_grace: VisibilityPolicy::DEFAULT_GRACE,
        }
    }
}

impl ManagerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the reconnect schedule
    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    /// Set the backgrounding grace period
    pub fn with_hidden_grace(mut self, grace: Duration) -> Self {
        self.hidden_grace = grace;
        self
    }
}
