use thiserror::Error;

use crate::{AggregateId, Version};

/// Failures surfaced by event store operations.
#[derive(Debug, Error)]
pub enum EventStoreError {
    /// Another writer advanced the stream past the expected version.
    #[error(
        "optimistic concurrency conflict on stream {aggregate_id}: expected version {expected}, stream is at {actual}"
    )]
    ConcurrencyConflict {
        aggregate_id: AggregateId,
        expected: Version,
        actual: Version,
    },

    /// The caller tried to start a stream that already has events.
    #[error("stream {aggregate_id} already exists at version {actual}")]
    StreamAlreadyExists {
        aggregate_id: AggregateId,
        actual: Version,
    },

    /// The stream has no events.
    #[error("stream {0} not found")]
    StreamNotFound(AggregateId),

    /// The append batch is malformed (empty, mixed streams, or
    /// non-sequential versions).
    #[error("invalid append batch: {0}")]
    InvalidBatch(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EventStoreError>;
