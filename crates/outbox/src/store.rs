use async_trait::async_trait;
use event_store::{AppendOptions, EventEnvelope, Version};

use crate::{MessageId, OutboxMessage, Result};

/// Storage for staged outbox messages.
///
/// Implementations must make `claim_pending` hand each pending message
/// to at most one concurrent claimant, and must put released messages
/// back into the pending pool for the next claim.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Stages messages as pending.
    ///
    /// Only for messages with no accompanying domain events. Use
    /// [`TransactionalAppend::append_and_stage`] when events and
    /// messages must commit together.
    async fn stage(&self, messages: Vec<OutboxMessage>) -> Result<()>;

    /// Claims up to `limit` pending messages, oldest first.
    ///
    /// Claimed messages are invisible to other claimants until
    /// published, released, or failed.
    async fn claim_pending(&self, limit: usize) -> Result<Vec<OutboxMessage>>;

    /// Marks a claimed message as successfully published.
    async fn mark_published(&self, id: MessageId) -> Result<()>;

    /// Returns a claimed message to the pending pool after a transient
    /// failure, incrementing its retry count.
    async fn release(&self, id: MessageId, error: &str) -> Result<()>;

    /// Dead-letters a message. It will never be retried.
    async fn mark_failed(&self, id: MessageId, error: &str) -> Result<()>;

    /// Returns all dead-lettered messages.
    async fn dead_letters(&self) -> Result<Vec<OutboxMessage>>;

    /// Returns the number of messages still waiting for publication.
    async fn pending_count(&self) -> Result<usize>;
}

/// Atomic append of domain events together with outbox messages.
///
/// This is the outbox guarantee: either the domain events and their
/// integration messages are all durable, or none are. The command side
/// never talks to the broker directly.
#[async_trait]
pub trait TransactionalAppend: Send + Sync {
    /// Appends domain events and stages outbox messages in one commit.
    ///
    /// Optimistic concurrency applies to the event append exactly as in
    /// [`event_store::EventStore::append`]; a version conflict stages
    /// nothing.
    async fn append_and_stage(
        &self,
        events: Vec<EventEnvelope>,
        options: AppendOptions,
        messages: Vec<OutboxMessage>,
    ) -> Result<Version>;
}
