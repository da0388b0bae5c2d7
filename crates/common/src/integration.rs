//! Cross-service integration event contract.
//!
//! Integration events are the only facts one bounded context shares with
//! another. They travel through the transactional outbox to the broker
//! and are folded into local mirrors by consuming services.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{AggregateId, CorrelationId, TenantId};

/// Topic the organization context publishes its integration events on.
pub const ORGANIZATIONS_TOPIC: &str = "organizations";

/// Wire envelope for a published integration event.
///
/// The payload is kept as raw JSON so the envelope can cross service
/// boundaries without every service linking every event type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationEnvelope {
    /// Unique message ID (stable across redeliveries of the same message).
    pub id: Uuid,

    /// Event type name used for consumer dispatch.
    pub event_type: String,

    /// The event body as JSON.
    pub payload: serde_json::Value,

    /// When the underlying fact occurred at the producer.
    ///
    /// Consumers use this for last-write-wins conflict resolution.
    pub occurred_at: DateTime<Utc>,

    /// Workflow correlation ID.
    pub correlation_id: CorrelationId,
}

impl IntegrationEnvelope {
    /// Wraps a serializable event in an envelope.
    pub fn wrap<T: Serialize>(
        event_type: impl Into<String>,
        event: &T,
        occurred_at: DateTime<Utc>,
        correlation_id: CorrelationId,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            id: Uuid::new_v4(),
            event_type: event_type.into(),
            payload: serde_json::to_value(event)?,
            occurred_at,
            correlation_id,
        })
    }

    /// Deserializes the payload into a concrete event type.
    pub fn decode<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

/// Integration events published by the organization context.
///
/// These are the public facts; internal domain events stay private to
/// the owning service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrganizationIntegrationEvent {
    /// Organization was fully provisioned (local aggregate active and
    /// external counterpart created).
    OrganizationCreated(OrganizationCreatedData),

    /// Organization attributes changed.
    OrganizationUpdated(OrganizationUpdatedData),

    /// Organization was removed (tombstone).
    OrganizationDeleted(OrganizationDeletedData),
}

impl OrganizationIntegrationEvent {
    /// Creates an OrganizationCreated event.
    pub fn organization_created(
        organization_id: AggregateId,
        tenant_id: TenantId,
        name: impl Into<String>,
        external_id: impl Into<String>,
    ) -> Self {
        Self::OrganizationCreated(OrganizationCreatedData {
            organization_id,
            tenant_id,
            name: name.into(),
            external_id: external_id.into(),
        })
    }

    /// Creates an OrganizationUpdated event.
    pub fn organization_updated(organization_id: AggregateId, name: impl Into<String>) -> Self {
        Self::OrganizationUpdated(OrganizationUpdatedData {
            organization_id,
            name: name.into(),
        })
    }

    /// Creates an OrganizationDeleted event.
    pub fn organization_deleted(organization_id: AggregateId) -> Self {
        Self::OrganizationDeleted(OrganizationDeletedData { organization_id })
    }

    /// Returns the event type name used on the wire.
    pub fn event_type(&self) -> &'static str {
        match self {
            OrganizationIntegrationEvent::OrganizationCreated(_) => "OrganizationCreated",
            OrganizationIntegrationEvent::OrganizationUpdated(_) => "OrganizationUpdated",
            OrganizationIntegrationEvent::OrganizationDeleted(_) => "OrganizationDeleted",
        }
    }
}

/// Data for OrganizationCreated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizationCreatedData {
    /// The organization aggregate ID.
    pub organization_id: AggregateId,

    /// Owning tenant.
    pub tenant_id: TenantId,

    /// Display name.
    pub name: String,

    /// Identifier assigned by the external directory system.
    pub external_id: String,
}

/// Data for OrganizationUpdated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizationUpdatedData {
    /// The organization aggregate ID.
    pub organization_id: AggregateId,

    /// New display name.
    pub name: String,
}

/// Data for OrganizationDeleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizationDeletedData {
    /// The organization aggregate ID.
    pub organization_id: AggregateId,
}
