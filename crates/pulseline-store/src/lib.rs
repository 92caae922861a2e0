// Notification Store
//
// This crate owns the deduplicated, capped, persisted notification log and
// the concrete backends behind the core seams: the REST client used for
// reconciliation and mark-read calls, and the file-backed key-value store
// holding one serialized log per user.
//
// Key design decisions:
// - The log is keyed per user; switching identities clears and reloads it,
//   so logs never leak across users sharing a device
// - Remote ids are derived deterministically from the backend id, making
//   ingestion idempotent under at-least-once delivery
// - Notifications are an enhancement: every server-call or storage failure
//   here is logged and absorbed, never surfaced to the caller

pub mod file_kv;
pub mod http;
pub mod store;

// Re-exports for convenience
pub use file_kv::FileKeyValueStore;
pub use http::{ApiConfig, HttpNotificationApi, HttpSnapshotSource};
pub use store::{NotificationStore, MAX_NOTIFICATIONS};
