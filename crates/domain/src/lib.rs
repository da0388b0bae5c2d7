//! Domain layer for the organization service.
//!
//! This crate provides the core domain abstractions including:
//! - Aggregate trait for event-sourced entities
//! - DomainEvent trait for domain events
//! - Command trait and CommandHandler for command processing
//! - Organization aggregate implementation with state machine

pub mod aggregate;
pub mod command;
pub mod error;
pub mod organization;

pub use aggregate::{Aggregate, DomainEvent, SnapshotCapable};
pub use command::{Command, CommandHandler, CommandResult, EventContext};
pub use error::DomainError;
pub use organization::{
    ActivateOrganization, CreateOrganization, ExternalId, Organization, OrganizationError,
    OrganizationEvent, OrganizationName, OrganizationService, OrganizationState,
    RemoveOrganization, RenameOrganization,
};
