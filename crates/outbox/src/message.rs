use chrono::{DateTime, Utc};
use common::{CorrelationId, IntegrationEnvelope};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an outbox message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(Uuid);

impl MessageId {
    /// Creates a new random message ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a message ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Delivery state of an outbox message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboxStatus {
    /// Staged and waiting for the publisher.
    Pending,
    /// Acknowledged by the broker.
    Published,
    /// Dead-lettered. Retries exhausted or the event type is unknown.
    Failed,
}

impl OutboxStatus {
    /// String form used in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboxStatus::Pending => "pending",
            OutboxStatus::Published => "published",
            OutboxStatus::Failed => "failed",
        }
    }

    /// Parses the database string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(OutboxStatus::Pending),
            "published" => Some(OutboxStatus::Published),
            "failed" => Some(OutboxStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for OutboxStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A staged integration event awaiting publication.
///
/// Rows are written in the same transaction as the domain events they
/// announce. `occurred_at` orders the drain; `published_at` is set only
/// after the broker acknowledges delivery, so a crash between publish
/// and acknowledgement leads to redelivery rather than loss.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxMessage {
    pub id: MessageId,
    pub topic: String,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub status: OutboxStatus,
    pub occurred_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
    pub retry_count: u32,
    pub last_error: Option<String>,
    pub correlation_id: Option<CorrelationId>,
}

impl OutboxMessage {
    /// Stages a new pending message for an integration envelope.
    pub fn new(topic: impl Into<String>, envelope: &IntegrationEnvelope) -> crate::Result<Self> {
        Ok(Self {
            id: MessageId::new(),
            topic: topic.into(),
            event_type: envelope.event_type.clone(),
            payload: serde_json::to_value(envelope)?,
            status: OutboxStatus::Pending,
            occurred_at: envelope.occurred_at,
            published_at: None,
            retry_count: 0,
            last_error: None,
            correlation_id: Some(envelope.correlation_id),
        })
    }

    /// Reconstructs the integration envelope from the stored payload.
    pub fn envelope(&self) -> crate::Result<IntegrationEnvelope> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }
}
