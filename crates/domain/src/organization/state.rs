//! Organization state machine.

use serde::{Deserialize, Serialize};

/// The state of an organization in its provisioning lifecycle.
///
/// State transitions:
/// ```text
/// Provisioning ──► Active
///       │            │
///       └────────────┴──► Removed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrganizationState {
    /// Organization exists locally, external provisioning is in flight.
    #[default]
    Provisioning,

    /// External provisioning succeeded, organization is usable.
    Active,

    /// Organization was removed (terminal tombstone state).
    Removed,
}

impl OrganizationState {
    /// Returns true if the organization can be activated in this state.
    pub fn can_activate(&self) -> bool {
        matches!(self, OrganizationState::Provisioning)
    }

    /// Returns true if the organization can be renamed in this state.
    pub fn can_rename(&self) -> bool {
        matches!(self, OrganizationState::Active)
    }

    /// Returns true if the organization can be removed in this state.
    pub fn can_remove(&self) -> bool {
        matches!(
            self,
            OrganizationState::Provisioning | OrganizationState::Active
        )
    }

    /// Returns true if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrganizationState::Removed)
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrganizationState::Provisioning => "Provisioning",
            OrganizationState::Active => "Active",
            OrganizationState::Removed => "Removed",
        }
    }
}

impl std::fmt::Display for OrganizationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
