//! Organization aggregate and related types.

mod aggregate;
mod commands;
mod events;
mod service;
mod state;
mod value_objects;

pub use aggregate::Organization;
pub use commands::*;
pub use events::{
    OrganizationActivatedData, OrganizationEvent, OrganizationInitiatedData,
    OrganizationRemovedData, OrganizationRenamedData,
};
pub use service::OrganizationService;
pub use state::OrganizationState;
pub use value_objects::{ExternalId, OrganizationName};

use thiserror::Error;

/// Errors that can occur during organization operations.
#[derive(Debug, Error)]
pub enum OrganizationError {
    /// Organization name must not be empty.
    #[error("Organization name is required")]
    NameRequired,

    /// Organization is not in the expected state.
    #[error("Invalid state transition: cannot {action} from {current_state} state")]
    InvalidStateTransition {
        current_state: OrganizationState,
        action: &'static str,
    },

    /// Organization does not exist.
    #[error("Organization not found")]
    NotFound,

    /// Organization is already initiated.
    #[error("Organization already initiated")]
    AlreadyInitiated,
}
