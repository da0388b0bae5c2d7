//! Domain error types.

use event_store::EventStoreError;
use outbox::OutboxError;
use thiserror::Error;

use crate::organization::OrganizationError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An error occurred in the event store.
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    /// An error occurred staging outbox messages.
    #[error("Outbox error: {0}")]
    Outbox(#[from] OutboxError),

    /// An error occurred in the organization aggregate.
    #[error("Organization error: {0}")]
    Organization(OrganizationError),

    /// Aggregate not found.
    #[error("Aggregate not found: {aggregate_type} with id {aggregate_id}")]
    AggregateNotFound {
        aggregate_type: &'static str,
        aggregate_id: String,
    },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
