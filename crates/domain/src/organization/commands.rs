//! Organization commands.

use common::{AggregateId, CorrelationId, TenantId};

use crate::command::Command;

use super::{ExternalId, Organization, OrganizationName};

/// Command to create a new organization.
#[derive(Debug, Clone)]
pub struct CreateOrganization {
    /// The organization ID to create.
    pub organization_id: AggregateId,

    /// The tenant that owns the organization.
    pub tenant_id: TenantId,

    /// The organization name.
    pub name: OrganizationName,

    /// Workflow this command belongs to, if any.
    pub correlation_id: Option<CorrelationId>,
}

impl CreateOrganization {
    /// Creates a new CreateOrganization command.
    pub fn new(
        organization_id: AggregateId,
        tenant_id: TenantId,
        name: impl Into<OrganizationName>,
    ) -> Self {
        Self {
            organization_id,
            tenant_id,
            name: name.into(),
            correlation_id: None,
        }
    }

    /// Creates a new CreateOrganization command with a generated organization ID.
    pub fn for_tenant(tenant_id: TenantId, name: impl Into<OrganizationName>) -> Self {
        Self::new(AggregateId::new(), tenant_id, name)
    }

    /// Attaches a workflow correlation ID.
    pub fn with_correlation(mut self, correlation_id: CorrelationId) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }
}

impl Command for CreateOrganization {
    type Aggregate = Organization;

    fn aggregate_id(&self) -> AggregateId {
        self.organization_id
    }
}

/// Command to activate an organization after external provisioning.
#[derive(Debug, Clone)]
pub struct ActivateOrganization {
    /// The organization to activate.
    pub organization_id: AggregateId,

    /// Identifier assigned by the external directory.
    pub external_id: ExternalId,

    /// Workflow this command belongs to, if any.
    pub correlation_id: Option<CorrelationId>,
}

impl ActivateOrganization {
    /// Creates a new ActivateOrganization command.
    pub fn new(organization_id: AggregateId, external_id: impl Into<ExternalId>) -> Self {
        Self {
            organization_id,
            external_id: external_id.into(),
            correlation_id: None,
        }
    }

    /// Attaches a workflow correlation ID.
    pub fn with_correlation(mut self, correlation_id: CorrelationId) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }
}

impl Command for ActivateOrganization {
    type Aggregate = Organization;

    fn aggregate_id(&self) -> AggregateId {
        self.organization_id
    }
}

/// Command to rename an organization.
#[derive(Debug, Clone)]
pub struct RenameOrganization {
    /// The organization to rename.
    pub organization_id: AggregateId,

    /// The new name.
    pub new_name: OrganizationName,

    /// Workflow this command belongs to, if any.
    pub correlation_id: Option<CorrelationId>,
}

impl RenameOrganization {
    /// Creates a new RenameOrganization command.
    pub fn new(organization_id: AggregateId, new_name: impl Into<OrganizationName>) -> Self {
        Self {
            organization_id,
            new_name: new_name.into(),
            correlation_id: None,
        }
    }

    /// Attaches a workflow correlation ID.
    pub fn with_correlation(mut self, correlation_id: CorrelationId) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }
}

impl Command for RenameOrganization {
    type Aggregate = Organization;

    fn aggregate_id(&self) -> AggregateId {
        self.organization_id
    }
}

/// Command to remove an organization.
#[derive(Debug, Clone)]
pub struct RemoveOrganization {
    /// The organization to remove.
    pub organization_id: AggregateId,

    /// Why the organization is being removed.
    pub reason: String,

    /// Workflow this command belongs to, if any.
    pub correlation_id: Option<CorrelationId>,
}

impl RemoveOrganization {
    /// Creates a new RemoveOrganization command.
    pub fn new(organization_id: AggregateId, reason: impl Into<String>) -> Self {
        Self {
            organization_id,
            reason: reason.into(),
            correlation_id: None,
        }
    }

    /// Attaches a workflow correlation ID.
    pub fn with_correlation(mut self, correlation_id: CorrelationId) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }
}

impl Command for RemoveOrganization {
    type Aggregate = Organization;

    fn aggregate_id(&self) -> AggregateId {
        self.organization_id
    }
}
