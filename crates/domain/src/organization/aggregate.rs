//! Organization aggregate implementation.

use common::{AggregateId, TenantId};
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::{Aggregate, SnapshotCapable};

use super::{
    ExternalId, OrganizationError, OrganizationEvent, OrganizationName, OrganizationState,
    events::{
        OrganizationActivatedData, OrganizationInitiatedData, OrganizationRemovedData,
        OrganizationRenamedData,
    },
};

/// Organization aggregate root.
///
/// Current state is a fold of the event stream. Command methods
/// validate against that state and emit events; they never mutate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Organization {
    /// Unique organization identifier.
    id: Option<AggregateId>,

    /// Current version for optimistic concurrency.
    #[serde(default)]
    version: Version,

    /// Tenant that owns the organization.
    tenant_id: Option<TenantId>,

    /// Current name.
    name: Option<OrganizationName>,

    /// Identifier in the external directory, set on activation.
    external_id: Option<ExternalId>,

    /// Current lifecycle state.
    state: OrganizationState,
}

impl Aggregate for Organization {
    type Event = OrganizationEvent;
    type Error = OrganizationError;

    fn aggregate_type() -> &'static str {
        "Organization"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            OrganizationEvent::OrganizationInitiated(data) => self.apply_initiated(data),
            OrganizationEvent::OrganizationActivated(data) => self.apply_activated(data),
            OrganizationEvent::OrganizationRenamed(data) => self.apply_renamed(data),
            OrganizationEvent::OrganizationRemoved(data) => self.apply_removed(data),
        }
    }
}

impl SnapshotCapable for Organization {
    fn snapshot_interval() -> usize {
        50
    }
}

// Query methods
impl Organization {
    /// Returns the owning tenant.
    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    /// Returns the current name.
    pub fn name(&self) -> Option<&OrganizationName> {
        self.name.as_ref()
    }

    /// Returns the external directory identifier, if activated.
    pub fn external_id(&self) -> Option<&ExternalId> {
        self.external_id.as_ref()
    }

    /// Returns the current state.
    pub fn state(&self) -> OrganizationState {
        self.state
    }

    /// Returns true if the organization is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

// Command methods (return events)
impl Organization {
    /// Creates the organization locally, pending external provisioning.
    pub fn initiate(
        &self,
        organization_id: AggregateId,
        tenant_id: TenantId,
        name: OrganizationName,
    ) -> Result<Vec<OrganizationEvent>, OrganizationError> {
        if self.id.is_some() {
            return Err(OrganizationError::AlreadyInitiated);
        }

        if name.is_blank() {
            return Err(OrganizationError::NameRequired);
        }

        Ok(vec![OrganizationEvent::organization_initiated(
            organization_id,
            tenant_id,
            name,
        )])
    }

    /// Activates the organization with the external directory identifier.
    ///
    /// Activating an already active organization is a no-op, so a
    /// re-delivered activation can be replayed safely.
    pub fn activate(
        &self,
        external_id: ExternalId,
    ) -> Result<Vec<OrganizationEvent>, OrganizationError> {
        if self.id.is_none() {
            return Err(OrganizationError::NotFound);
        }

        if self.state == OrganizationState::Active {
            return Ok(vec![]);
        }

        if !self.state.can_activate() {
            return Err(OrganizationError::InvalidStateTransition {
                current_state: self.state,
                action: "activate",
            });
        }

        Ok(vec![OrganizationEvent::organization_activated(external_id)])
    }

    /// Renames the organization.
    ///
    /// Renaming to the current name is a no-op and emits nothing.
    pub fn rename(
        &self,
        new_name: OrganizationName,
    ) -> Result<Vec<OrganizationEvent>, OrganizationError> {
        if self.id.is_none() {
            return Err(OrganizationError::NotFound);
        }

        if !self.state.can_rename() {
            return Err(OrganizationError::InvalidStateTransition {
                current_state: self.state,
                action: "rename",
            });
        }

        if new_name.is_blank() {
            return Err(OrganizationError::NameRequired);
        }

        match &self.name {
            Some(old_name) if *old_name == new_name => Ok(vec![]),
            Some(old_name) => Ok(vec![OrganizationEvent::organization_renamed(
                old_name.clone(),
                new_name,
            )]),
            None => Ok(vec![OrganizationEvent::organization_renamed(
                OrganizationName::new(""),
                new_name,
            )]),
        }
    }

    /// Removes the organization.
    ///
    /// Removing an already removed organization is a no-op, so
    /// compensation can be re-delivered safely.
    pub fn remove(
        &self,
        reason: impl Into<String>,
    ) -> Result<Vec<OrganizationEvent>, OrganizationError> {
        if self.id.is_none() {
            return Err(OrganizationError::NotFound);
        }

        if self.state == OrganizationState::Removed {
            return Ok(vec![]);
        }

        Ok(vec![OrganizationEvent::organization_removed(reason)])
    }
}

// Apply event helpers
impl Organization {
    fn apply_initiated(&mut self, data: OrganizationInitiatedData) {
        self.id = Some(data.organization_id);
        self.tenant_id = Some(data.tenant_id);
        self.name = Some(data.name);
        self.state = OrganizationState::Provisioning;
    }

    fn apply_activated(&mut self, data: OrganizationActivatedData) {
        self.external_id = Some(data.external_id);
        self.state = OrganizationState::Active;
    }

    fn apply_renamed(&mut self, data: OrganizationRenamedData) {
        self.name = Some(data.new_name);
    }

    fn apply_removed(&mut self, _data: OrganizationRemovedData) {
        self.state = OrganizationState::Removed;
    }
}
