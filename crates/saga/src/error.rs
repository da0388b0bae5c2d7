//! Saga error types.

use common::CorrelationId;
use domain::DomainError;
use thiserror::Error;

use crate::state::SagaStatus;

/// Errors that can occur during saga operations.
#[derive(Debug, Error)]
pub enum SagaError {
    /// An external provisioning step failed.
    #[error("External step failed: {0}")]
    ExternalStep(String),

    /// Trigger does not apply to the saga's current status.
    #[error("Invalid trigger {trigger} for saga in {status} status")]
    InvalidTrigger {
        trigger: &'static str,
        status: SagaStatus,
    },

    /// Saga instance not found in the store.
    #[error("Saga not found: {0}")]
    SagaNotFound(CorrelationId),

    /// Domain error from executing a saga action.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Database error from the saga store.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;
