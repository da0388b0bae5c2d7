//! Organization domain events.
//!
//! These events stay private to this service. The cross-service
//! contract lives in `common::integration` and is staged through the
//! outbox, not derived from these types on the wire.

use chrono::{DateTime, Utc};
use common::{AggregateId, TenantId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

use super::{ExternalId, OrganizationName};

/// Events that can occur on an organization aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrganizationEvent {
    /// Organization was created locally, external provisioning pending.
    OrganizationInitiated(OrganizationInitiatedData),

    /// External provisioning succeeded and the organization went active.
    OrganizationActivated(OrganizationActivatedData),

    /// Organization was renamed.
    OrganizationRenamed(OrganizationRenamedData),

    /// Organization was removed.
    OrganizationRemoved(OrganizationRemovedData),
}

impl DomainEvent for OrganizationEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrganizationEvent::OrganizationInitiated(_) => "OrganizationInitiated",
            OrganizationEvent::OrganizationActivated(_) => "OrganizationActivated",
            OrganizationEvent::OrganizationRenamed(_) => "OrganizationRenamed",
            OrganizationEvent::OrganizationRemoved(_) => "OrganizationRemoved",
        }
    }
}

/// Data for OrganizationInitiated event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizationInitiatedData {
    /// The unique organization ID.
    pub organization_id: AggregateId,

    /// The tenant that owns the organization.
    pub tenant_id: TenantId,

    /// Organization name at creation.
    pub name: OrganizationName,

    /// When the organization was initiated.
    pub initiated_at: DateTime<Utc>,
}

/// Data for OrganizationActivated event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizationActivatedData {
    /// Identifier assigned by the external directory.
    pub external_id: ExternalId,

    /// When the organization was activated.
    pub activated_at: DateTime<Utc>,
}

/// Data for OrganizationRenamed event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizationRenamedData {
    /// Previous name.
    pub old_name: OrganizationName,

    /// New name.
    pub new_name: OrganizationName,

    /// When the rename happened.
    pub renamed_at: DateTime<Utc>,
}

/// Data for OrganizationRemoved event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizationRemovedData {
    /// Why the organization was removed.
    pub reason: String,

    /// When the organization was removed.
    pub removed_at: DateTime<Utc>,
}

// Convenience constructors for events
impl OrganizationEvent {
    /// Creates an OrganizationInitiated event.
    pub fn organization_initiated(
        organization_id: AggregateId,
        tenant_id: TenantId,
        name: OrganizationName,
    ) -> Self {
        OrganizationEvent::OrganizationInitiated(OrganizationInitiatedData {
            organization_id,
            tenant_id,
            name,
            initiated_at: Utc::now(),
        })
    }

    /// Creates an OrganizationActivated event.
    pub fn organization_activated(external_id: ExternalId) -> Self {
        OrganizationEvent::OrganizationActivated(OrganizationActivatedData {
            external_id,
            activated_at: Utc::now(),
        })
    }

    /// Creates an OrganizationRenamed event.
    pub fn organization_renamed(old_name: OrganizationName, new_name: OrganizationName) -> Self {
        OrganizationEvent::OrganizationRenamed(OrganizationRenamedData {
            old_name,
            new_name,
            renamed_at: Utc::now(),
        })
    }

    /// Creates an OrganizationRemoved event.
    pub fn organization_removed(reason: impl Into<String>) -> Self {
        OrganizationEvent::OrganizationRemoved(OrganizationRemovedData {
            reason: reason.into(),
            removed_at: Utc::now(),
        })
    }
}
