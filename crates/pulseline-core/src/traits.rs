// Core traits for pluggable backends
//
// These traits keep the state machines and dedup logic testable without a
// network or filesystem:
// - In-memory implementations for examples and testing (see `memory`)
// - HTTP/file implementations for production (see pulseline-store)
// - The SSE transport for the live stream (see pulseline-realtime)

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::connection::StreamRole;
use crate::error::Result;
use crate::event::{StreamEvent, StreamFrame};
use crate::notification::RemoteNotification;
use crate::snapshot::EntityRecord;

/// Stream of labeled frames from an open connection
///
/// The stream ends (or yields an error) only on network/server closure;
/// liveness is inferred from the transport's own signaling.
pub type FrameStream = BoxStream<'static, Result<StreamFrame>>;

// ============================================================================
// StreamTransport - opens the long-lived pushed event stream
// ============================================================================

/// Trait for opening the server-pushed event stream
///
/// Implementations can:
/// - Open a real SSE connection over HTTP
/// - Replay scripted frames for testing
#[async_trait]
pub trait StreamTransport: Send + Sync {
    /// Open a stream for the given role
    ///
    /// Resolves once the connection is established (or failed); dropping the
    /// returned stream closes the connection.
    async fn open(&self, role: StreamRole) -> Result<FrameStream>;
}

// ============================================================================
// EventHandler - receives routed stream events
// ============================================================================

/// Trait for handling dispatched stream events
///
/// Handlers are invoked in frame arrival order, one at a time. Errors are
/// logged by the dispatcher and never tear down the connection.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: StreamEvent) -> Result<()>;
}

// ============================================================================
// NotificationApi - REST surface for the notification log
// ============================================================================

/// Trait for the backend's notification REST endpoints
///
/// `fetch_unread` powers reconciliation; the mark-read calls are best-effort
/// from the caller's perspective.
#[async_trait]
pub trait NotificationApi: Send + Sync {
    /// Fetch the currently-unread notification set
    async fn fetch_unread(&self) -> Result<Vec<RemoteNotification>>;

    /// Mark a single notification as read
    async fn mark_read(&self, id: i64) -> Result<()>;

    /// Mark all of the user's notifications as read
    async fn mark_all_read(&self) -> Result<()>;
}

// ============================================================================
// SnapshotSource - polled collections without push support
// ============================================================================

/// Trait for fetching one watched collection wholesale
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Fetch the current contents of the collection
    async fn fetch(&self) -> Result<Vec<EntityRecord>>;
}

// ============================================================================
// KeyValueStore - persisted local state
// ============================================================================

/// Trait for the persisted per-user state entries
///
/// Implementations can:
/// - Store values as files on disk
/// - Keep values in memory for testing
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value, `None` when the key was never written
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Delete a value; deleting a missing key is not an error
    async fn remove(&self, key: &str) -> Result<()>;
}
