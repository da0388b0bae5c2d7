use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AggregateId, Version};

/// Serialized aggregate state captured at a known version.
///
/// A replay-avoidance cache, never authoritative. Rehydration folds the
/// events after `version` on top of `state`; the result must equal a
/// fold from scratch, so a stale or missing snapshot only costs time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Stream the snapshot was taken from.
    pub aggregate_id: AggregateId,

    /// Aggregate type, e.g. "Organization".
    pub aggregate_type: String,

    /// Version of the last event folded into `state`.
    pub version: Version,

    /// When the snapshot was taken.
    pub timestamp: DateTime<Utc>,

    /// The aggregate state as JSON.
    pub state: serde_json::Value,
}

impl Snapshot {
    /// Builds a snapshot from already-serialized state.
    pub fn new(
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        version: Version,
        state: serde_json::Value,
    ) -> Self {
        Self {
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            version,
            timestamp: Utc::now(),
            state,
        }
    }

    /// Serializes `state` and builds a snapshot from it.
    pub fn from_state<T: Serialize>(
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        version: Version,
        state: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(
            aggregate_id,
            aggregate_type,
            version,
            serde_json::to_value(state)?,
        ))
    }

    /// Deserializes the captured state into a concrete type.
    pub fn into_state<T: for<'de> Deserialize<'de>>(self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.state)
    }
}
