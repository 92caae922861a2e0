// Stream events
//
// StreamFrame is the raw labeled unit read off the transport; StreamEvent is
// the typed union the dispatcher routes on. Payloads are plain data and are
// never mutated after dispatch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{RealtimeError, Result};

/// One labeled unit of data read off the stream
#[derive(Debug, Clone, PartialEq)]
pub struct StreamFrame {
    /// The `kind` label attached to the frame
    pub kind: String,
    /// Raw JSON payload text
    pub data: String,
}

impl StreamFrame {
    pub fn new(kind: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            data: data.into(),
        }
    }
}

/// Payload of the server's connection acknowledgement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionAckPayload {
    #[serde(default)]
    pub user_id: Option<i64>,
}

/// Payload of a lesson status change push
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonStatusPayload {
    pub lesson_id: i64,
    pub status: String,
    #[serde(default)]
    pub title: Option<String>,
}

/// Payload of a booking creation push
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingPayload {
    pub booking_id: i64,
    #[serde(default)]
    pub lesson_id: Option<i64>,
    #[serde(default)]
    pub student_name: Option<String>,
}

/// Payload of a published availability push
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityPayload {
    pub availability_id: i64,
    pub tutor_id: i64,
    pub starts_at: DateTime<Utc>,
}

/// Typed stream event, keyed by the frame's `kind` label
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Server acknowledged the subscription
    ConnectionAck(ConnectionAckPayload),
    /// A notification was pushed
    Notification(crate::notification::RemoteNotification),
    /// A lesson's status changed
    LessonStatusChanged(LessonStatusPayload),
    /// A booking was created
    BookingCreated(BookingPayload),
    /// A tutor published new availability
    AvailabilityPublished(AvailabilityPayload),
    /// Escape hatch for named domain events without a dedicated shape
    Custom { name: String, payload: Value },
}

/// Wire labels for each event kind
pub mod kinds {
    pub const CONNECTED: &str = "connected";
    pub const NOTIFICATION: &str = "notification";
    pub const LESSON_STATUS_CHANGED: &str = "lesson-status-changed";
    pub const BOOKING_CREATED: &str = "booking-created";
    pub const AVAILABILITY_PUBLISHED: &str = "availability-published";
    pub const DOMAIN_EVENT: &str = "domain-event";
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct CustomPayload {
    name: String,
    #[serde(default)]
    payload: Value,
}

impl StreamEvent {
    /// The `kind` label this event is routed on
    pub fn kind(&self) -> &str {
        match self {
            StreamEvent::ConnectionAck(_) => kinds::CONNECTED,
            StreamEvent::Notification(_) => kinds::NOTIFICATION,
            StreamEvent::LessonStatusChanged(_) => kinds::LESSON_STATUS_CHANGED,
            StreamEvent::BookingCreated(_) => kinds::BOOKING_CREATED,
            StreamEvent::AvailabilityPublished(_) => kinds::AVAILABILITY_PUBLISHED,
            StreamEvent::Custom { .. } => kinds::DOMAIN_EVENT,
        }
    }

    /// Parse a raw frame into a typed event
    ///
    /// Returns `Ok(None)` for unknown kinds (forward compatibility with
    /// server-added event types) and an error when the payload does not
    /// match the expected shape for a known kind.
    pub fn parse(frame: &StreamFrame) -> Result<Option<StreamEvent>> {
        fn payload<T: serde::de::DeserializeOwned>(frame: &StreamFrame) -> Result<T> {
            serde_json::from_str(&frame.data)
                .map_err(|e| RealtimeError::malformed(&frame.kind, e.to_string()))
        }

        let event = match frame.kind.as_str() {
            kinds::CONNECTED => StreamEvent::ConnectionAck(payload(frame)?),
            kinds::NOTIFICATION => StreamEvent::Notification(payload(frame)?),
            kinds::LESSON_STATUS_CHANGED => StreamEvent::LessonStatusChanged(payload(frame)?),
            kinds::BOOKING_CREATED => StreamEvent::BookingCreated(payload(frame)?),
            kinds::AVAILABILITY_PUBLISHED => StreamEvent::AvailabilityPublished(payload(frame)?),
            kinds::DOMAIN_EVENT => {
                let custom: CustomPayload = payload(frame)?;
                StreamEvent::Custom {
                    name: custom.name,
                    payload: custom.payload,
                }
            }
            _ => return Ok(None),
        };
        Ok(Some(event))
    }
}
