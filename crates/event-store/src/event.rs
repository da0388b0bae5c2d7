use chrono::{DateTime, Utc};
use common::{CausationId, CorrelationId, TenantId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AggregateId;

/// Identity of a single stored event, assigned once at build time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps a UUID read back from storage.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Position of an event within its stream.
///
/// An empty stream sits at [`Version::initial`] (0); the first event
/// carries [`Version::first`] (1) and each later event the predecessor's
/// [`Version::next`]. Appends compare these values for optimistic
/// concurrency control.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Version of a stream that holds no events yet.
    pub fn initial() -> Self {
        Self(0)
    }

    /// Version carried by the first event of a stream.
    pub fn first() -> Self {
        Self(1)
    }

    /// Version the event after this one must carry.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A domain event plus the metadata the store needs to place it.
///
/// Context identifiers (tenant, correlation, causation) are explicit
/// fields on the envelope. They are supplied by the caller at append
/// time, never pulled from ambient state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Identity of this event.
    pub event_id: EventId,

    /// Event type name, e.g. "OrganizationInitiated".
    pub event_type: String,

    /// Stream the event belongs to.
    pub aggregate_id: AggregateId,

    /// Aggregate type, e.g. "Organization".
    pub aggregate_type: String,

    /// Stream version after this event.
    pub version: Version,

    /// When the event was recorded.
    pub timestamp: DateTime<Utc>,

    /// Event body as JSON.
    pub payload: serde_json::Value,

    /// Tenant that owns the aggregate.
    pub tenant_id: Option<TenantId>,

    /// Workflow this event belongs to.
    pub correlation_id: Option<CorrelationId>,

    /// The message that caused this event.
    pub causation_id: Option<CausationId>,
}

impl EventEnvelope {
    pub fn builder() -> EventEnvelopeBuilder {
        EventEnvelopeBuilder::default()
    }
}

/// Assembles an [`EventEnvelope`] field by field.
///
/// Event type, stream, aggregate type, version, and payload are
/// required. The event id and timestamp are assigned when the envelope
/// is built; context identifiers default to absent.
#[derive(Debug, Default)]
pub struct EventEnvelopeBuilder {
    event_type: Option<String>,
    aggregate_id: Option<AggregateId>,
    aggregate_type: Option<String>,
    version: Option<Version>,
    payload: Option<serde_json::Value>,
    tenant_id: Option<TenantId>,
    correlation_id: Option<CorrelationId>,
    causation_id: Option<CausationId>,
}

impl EventEnvelopeBuilder {
    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    pub fn aggregate_id(mut self, id: AggregateId) -> Self {
        self.aggregate_id = Some(id);
        self
    }

    pub fn aggregate_type(mut self, aggregate_type: impl Into<String>) -> Self {
        self.aggregate_type = Some(aggregate_type.into());
        self
    }

    pub fn version(mut self, version: Version) -> Self {
        self.version = Some(version);
        self
    }

    /// Serializes a value into the payload slot.
    pub fn payload<T: Serialize>(mut self, payload: &T) -> Result<Self, serde_json::Error> {
        self.payload = Some(serde_json::to_value(payload)?);
        Ok(self)
    }

    /// Uses an already-built JSON value as the payload.
    pub fn payload_raw(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn tenant_id(mut self, tenant_id: TenantId) -> Self {
        self.tenant_id = Some(tenant_id);
        self
    }

    pub fn correlation_id(mut self, correlation_id: CorrelationId) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    pub fn causation_id(mut self, causation_id: CausationId) -> Self {
        self.causation_id = Some(causation_id);
        self
    }

    /// Returns `None` when any required field was never set.
    pub fn try_build(self) -> Option<EventEnvelope> {
        Some(EventEnvelope {
            event_id: EventId::new(),
            event_type: self.event_type?,
            aggregate_id: self.aggregate_id?,
            aggregate_type: self.aggregate_type?,
            version: self.version?,
            timestamp: Utc::now(),
            payload: self.payload?,
            tenant_id: self.tenant_id,
            correlation_id: self.correlation_id,
            causation_id: self.causation_id,
        })
    }

    /// Builds the envelope.
    ///
    /// # Panics
    ///
    /// Panics when a required field was never set. Callers assembling
    /// envelopes from untrusted input should use [`Self::try_build`].
    pub fn build(self) -> EventEnvelope {
        match self.try_build() {
            Some(envelope) => envelope,
            None => panic!("event envelope is missing a required field"),
        }
    }
}
