// Snapshot projections for the change-detection poller
//
// Collections without push support are fetched wholesale on an interval and
// diffed by id/status. EntityRecord is the permissive wire shape; the poller
// keeps only EntityProjection per id between cycles.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One entity as returned by a polled snapshot endpoint
///
/// Only `id` is required; `status` participates in change detection and the
/// remaining fields are kept raw for event synthesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRecord {
    pub id: i64,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EntityRecord {
    pub fn new(id: i64, status: Option<&str>) -> Self {
        Self {
            id,
            status: status.map(str::to_string),
            extra: Map::new(),
        }
    }

    /// Reduce to the projection retained between poll cycles
    pub fn projection(&self) -> EntityProjection {
        EntityProjection {
            status: self.status.clone(),
        }
    }
}

/// The per-id projection retained between poll cycles
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityProjection {
    pub status: Option<String>,
}
