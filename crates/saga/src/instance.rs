//! Persisted saga instance state.

use chrono::{DateTime, Utc};
use common::{AggregateId, CorrelationId, TenantId};
use serde::{Deserialize, Serialize};

use crate::state::SagaStatus;

/// Saga type discriminator stored alongside each instance.
pub const SAGA_TYPE: &str = "OrganizationProvisioning";

/// State of one organization provisioning saga.
///
/// The saga ID doubles as the correlation ID for every command and
/// external call the saga issues, so redeliveries of the same trigger
/// land on the same instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisioningSaga {
    /// Saga ID, used as correlation ID throughout.
    pub id: CorrelationId,

    /// The organization being provisioned.
    pub organization_id: AggregateId,

    /// Tenant that requested the organization.
    pub tenant_id: TenantId,

    /// Requested organization name.
    pub name: String,

    /// Identifier the external directory assigned, once known.
    pub external_id: Option<String>,

    /// Set once the Start trigger has been handled.
    pub started: bool,

    /// Current status.
    pub status: SagaStatus,

    /// Why the saga failed, if it did.
    pub failure_reason: Option<String>,

    /// When the saga started.
    pub started_at: DateTime<Utc>,

    /// Last status change.
    pub updated_at: DateTime<Utc>,
}

impl ProvisioningSaga {
    /// Creates a new Running saga.
    pub fn new(
        id: CorrelationId,
        organization_id: AggregateId,
        tenant_id: TenantId,
        name: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            organization_id,
            tenant_id,
            name: name.into(),
            external_id: None,
            started: false,
            status: SagaStatus::Running,
            failure_reason: None,
            started_at: now,
            updated_at: now,
        }
    }

    /// Returns the saga type discriminator.
    pub fn saga_type(&self) -> &'static str {
        SAGA_TYPE
    }

    /// Returns true if the saga reached a terminal status.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
