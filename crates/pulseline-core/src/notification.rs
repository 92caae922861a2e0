// Notification model
//
// RemoteNotification is the backend wire shape; Notification is the entry
// stored in the local log. Remote entries derive their log id from the
// backend's numeric id so the same server-side notification can never be
// inserted twice, no matter whether it arrived over the stream or via a
// reconciliation fetch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Routing category for a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationCategory {
    Lesson,
    Booking,
    Availability,
    Payment,
    System,
}

impl NotificationCategory {
    /// Map the backend's `type` string to a category
    ///
    /// Unrecognized types fall back to `System` so server-added types do not
    /// break ingestion.
    pub fn from_wire(kind: &str) -> Self {
        match kind {
            "lesson_update" | "lesson_reminder" => NotificationCategory::Lesson,
            "booking_request" | "booking_update" => NotificationCategory::Booking,
            "availability_published" => NotificationCategory::Availability,
            "payment_received" | "invoice_issued" => NotificationCategory::Payment,
            _ => NotificationCategory::System,
        }
    }
}

/// Where a log entry came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationOrigin {
    /// Pushed or fetched from the backend
    Remote,
    /// Synthesized locally (e.g. from a snapshot diff)
    Local,
}

/// Backend wire shape for a notification
///
/// Delivered both as the payload of a `notification` stream frame and as the
/// elements of the unread-list reconciliation fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteNotification {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Log id for a backend notification
///
/// Deterministic so dedup holds across transports and restarts.
pub fn remote_log_id(source_id: i64) -> String {
    format!("backend-{source_id}")
}

/// One entry in the local notification log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Globally unique within a user's log
    pub id: String,
    /// Backend numeric id for remote entries
    pub source_id: Option<i64>,
    pub category: NotificationCategory,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub link: Option<String>,
    pub created_at: DateTime<Utc>,
    pub read: bool,
    pub origin: NotificationOrigin,
}

impl Notification {
    /// Build a log entry from a backend notification
    pub fn from_remote(remote: &RemoteNotification) -> Self {
        Notification {
            id: remote_log_id(remote.id),
            source_id: Some(remote.id),
            category: NotificationCategory::from_wire(&remote.kind),
            title: remote.title.clone(),
            message: remote.message.clone(),
            link: remote.link.clone(),
            created_at: remote.created_at,
            read: remote.is_read,
            origin: NotificationOrigin::Remote,
        }
    }

    /// Build a locally-originated entry (uuid v7 id)
    pub fn local(
        category: NotificationCategory,
        title: impl Into<String>,
        message: impl Into<String>,
        link: Option<String>,
    ) -> Self {
        Notification {
            id: Uuid::now_v7().to_string(),
            source_id: None,
            category,
            title: title.into(),
            message: message.into(),
            link,
            created_at: Utc::now(),
            read: false,
            origin: NotificationOrigin::Local,
        }
    }
}
