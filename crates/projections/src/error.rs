//! Consumer error types.

use thiserror::Error;

/// Errors that can occur while consuming integration events.
#[derive(Debug, Error)]
pub enum ProjectionError {
    /// No handler is registered for the envelope's event type.
    ///
    /// Unknown event types are never retried; the envelope goes to the
    /// consumer dead-letter list instead.
    #[error("No handler registered for event type '{0}'")]
    UnknownEventType(String),

    /// Failed to deserialize an envelope payload.
    #[error("Payload deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// A handler-specific error.
    #[error("Handler error: {0}")]
    Handler(String),
}

/// Result type for consumer operations.
pub type Result<T> = std::result::Result<T, ProjectionError>;
