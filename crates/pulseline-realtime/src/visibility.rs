//! Visibility policy
//!
//! Tracks the host environment's foreground/background signal and decides
//! what the connection manager should do about it. Backgrounding an active
//! connection arms a grace timer; only when it fires is the stream torn down
//! (brief tab switches stay connected). Foregrounding resumes a
//! visibility-suspended connection, or an attempt that was deferred while
//! hidden.
//!
//! The policy itself is pure state + decisions; the connection manager owns
//! the actual timer.

use std::time::Duration;

/// Host foreground/background signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}

/// What to do on a foreground transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeAction {
    /// Nothing to resume
    None,
    /// Reconnect immediately with the attempt count reset
    Reconnect,
    /// Run the retry attempt that was deferred while hidden
    RetryNow,
}

/// Tracks visibility transitions and the suspension/deferral memory
#[derive(Debug, Clone)]
pub struct VisibilityPolicy {
    grace: Duration,
    visibility: Visibility,
    suspended_while_active: bool,
    deferred_retry: bool,
}

impl VisibilityPolicy {
    /// Default grace period before a backgrounded connection is torn down
    pub const DEFAULT_GRACE: Duration = Duration::from_secs(30);

    pub fn new(grace: Duration) -> Self {
        Self {
            grace,
            visibility: Visibility::Visible,
            suspended_while_active: false,
            deferred_retry: false,
        }
    }

    /// Current visibility
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn is_hidden(&self) -> bool {
        self.visibility == Visibility::Hidden
    }

    /// Handle a transition to hidden
    ///
    /// Returns the grace duration to arm when a connection is currently open
    /// or being pursued; `None` means nothing to tear down later.
    pub fn on_hidden(&mut self, connection_active: bool) -> Option<Duration> {
        self.visibility = Visibility::Hidden;
        connection_active.then_some(self.grace)
    }

    /// Handle a transition to visible
    ///
    /// Clears the suspension/deferral memory and tells the caller what to
    /// resume. The caller must also cancel any pending grace timer.
    pub fn on_visible(&mut self) -> ResumeAction {
        self.visibility = Visibility::Visible;
        if self.suspended_while_active {
            self.suspended_while_active = false;
            self.deferred_retry = false;
            ResumeAction::Reconnect
        } else if self.deferred_retry {
            self.deferred_retry = false;
            ResumeAction::RetryNow
        } else {
            ResumeAction::None
        }
    }

    /// The grace timer fired and the connection was torn down
    pub fn note_suspended(&mut self) {
        self.suspended_while_active = true;
    }

    /// A retry timer fired while hidden; the attempt waits for foreground
    pub fn defer_retry(&mut self) {
        self.deferred_retry = true;
    }

    /// Forget any pending resume (intentional disconnect)
    pub fn reset(&mut self) {
        self.suspended_while_active = false;
        self.deferred_retry = false;
    }
}

impl Default for VisibilityPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_GRACE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_with_active_connection_arms_grace() {
        let mut policy = VisibilityPolicy::new(Duration::from_secs(30));
        assert_eq!(policy.on_hidden(true), Some(Duration::from_secs(30)));
        assert!(policy.is_hidden());
    }

    #[test]
    fn test_hidden_without_connection_arms_nothing() {
        let mut policy = VisibilityPolicy::default();
        assert_eq!(policy.on_hidden(false), None);
    }

    #[test]
    fn test_brief_hide_resumes_nothing() {
        let mut policy = VisibilityPolicy::default();
        policy.on_hidden(true);
        // Grace never fired, so there is nothing to resume.
        assert_eq!(policy.on_visible(), ResumeAction::None);
    }

    #[test]
    fn test_suspension_resumes_with_reconnect() {
        let mut policy = VisibilityPolicy::default();
        policy.on_hidden(true);
        policy.note_suspended();
        assert_eq!(policy.on_visible(), ResumeAction::Reconnect);
        // The memory is consumed by the transition.
        assert_eq!(policy.on_visible(), ResumeAction::None);
    }

    #[test]
    fn test_deferred_retry_resumes_on_foreground() {
        let mut policy = VisibilityPolicy::default();
        policy.on_hidden(true);
        policy.defer_retry();
        assert_eq!(policy.on_visible(), ResumeAction::RetryNow);
    }

    #[test]
    fn test_suspension_wins_over_deferred_retry() {
        let mut policy = VisibilityPolicy::default();
        policy.on_hidden(true);
        policy.defer_retry();
        policy.note_suspended();
        assert_eq!(policy.on_visible(), ResumeAction::Reconnect);
    }

    #[test]
    fn test_reset_forgets_pending_resume() {
        let mut policy = VisibilityPolicy::default();
        policy.on_hidden(true);
        policy.note_suspended();
        policy.reset();
        assert_eq!(policy.on_visible(), ResumeAction::None);
    }
}
