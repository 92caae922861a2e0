// Realtime Client Abstractions
//
// This crate provides the transport- and storage-agnostic core of the
// Pulseline realtime subsystem: stream events, the notification model,
// connection/retry state, and the trait seams the concrete backends plug
// into.
//
// Key design decisions:
// - Uses traits (StreamTransport, KeyValueStore, NotificationApi,
//   SnapshotSource, EventHandler) for pluggable backends
// - Wire DTOs are defined here so the stream client and the store agree on
//   shapes without depending on each other
// - Observable state is a small watch-backed Signal rather than a reactive
//   framework dependency
// - In-memory implementations live in `memory` for examples and testing

pub mod connection;
pub mod error;
pub mod event;
pub mod notification;
pub mod signal;
pub mod snapshot;
pub mod traits;

// In-memory implementations for examples and testing
pub mod memory;

// Re-exports for convenience
pub use connection::{ConnectionState, RetryState, StreamRole};
pub use error::{RealtimeError, Result};
pub use event::{
    AvailabilityPayload, BookingPayload, ConnectionAckPayload, LessonStatusPayload, StreamEvent,
    StreamFrame,
};
pub use notification::{
    remote_log_id, Notification, NotificationCategory, NotificationOrigin, RemoteNotification,
};
pub use signal::Signal;
pub use snapshot::{EntityProjection, EntityRecord};
pub use traits::{
    EventHandler, FrameStream, KeyValueStore, NotificationApi, SnapshotSource, StreamTransport,
};
