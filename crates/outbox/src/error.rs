use thiserror::Error;

/// Errors that can occur in outbox operations.
#[derive(Debug, Error)]
pub enum OutboxError {
    /// No handler is registered for the message's event type. The
    /// message is dead-lettered immediately, retrying cannot help.
    #[error("unknown event type: {0}")]
    UnknownEventType(String),

    /// The broker rejected or failed to deliver the message.
    #[error("publish failed: {0}")]
    Publish(String),

    /// A staged message referenced an outbox row that does not exist.
    #[error("outbox message not found: {0}")]
    MessageNotFound(crate::MessageId),

    /// The accompanying event append failed.
    #[error(transparent)]
    EventStore(#[from] event_store::EventStoreError),

    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl OutboxError {
    /// Returns true when retrying the operation cannot succeed.
    pub fn is_permanent(&self) -> bool {
        matches!(self, OutboxError::UnknownEventType(_))
    }
}

/// Result type for outbox operations.
pub type Result<T> = std::result::Result<T, OutboxError>;
