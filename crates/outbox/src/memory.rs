use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use event_store::{AppendOptions, EventEnvelope, EventStore, InMemoryEventStore, Version};
use tokio::sync::RwLock;

use crate::{
    MessageId, OutboxError, OutboxMessage, OutboxStatus, Result,
    store::{OutboxStore, TransactionalAppend},
};

/// In-memory outbox store for testing.
///
/// Wraps an [`InMemoryEventStore`] so that append-and-stage exercises
/// the same code paths as the PostgreSQL implementation. Claims are
/// tracked in a lease set, mirroring row locks.
#[derive(Clone, Default)]
pub struct InMemoryOutboxStore {
    event_store: InMemoryEventStore,
    messages: Arc<RwLock<Vec<OutboxMessage>>>,
    claimed: Arc<RwLock<HashSet<MessageId>>>,
}

impl InMemoryOutboxStore {
    /// Creates a new empty in-memory outbox store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store sharing the given event store.
    pub fn with_event_store(event_store: InMemoryEventStore) -> Self {
        Self {
            event_store,
            ..Self::default()
        }
    }

    /// The underlying event store.
    pub fn event_store(&self) -> &InMemoryEventStore {
        &self.event_store
    }

    /// Returns a message by ID, for assertions in tests.
    pub async fn get(&self, id: MessageId) -> Option<OutboxMessage> {
        self.messages.read().await.iter().find(|m| m.id == id).cloned()
    }

    /// Returns all messages with the given status.
    pub async fn messages_with_status(&self, status: OutboxStatus) -> Vec<OutboxMessage> {
        self.messages
            .read()
            .await
            .iter()
            .filter(|m| m.status == status)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl OutboxStore for InMemoryOutboxStore {
    async fn stage(&self, messages: Vec<OutboxMessage>) -> Result<()> {
        self.messages.write().await.extend(messages);
        Ok(())
    }

    async fn claim_pending(&self, limit: usize) -> Result<Vec<OutboxMessage>> {
        let messages = self.messages.read().await;
        let mut claimed = self.claimed.write().await;

        let mut batch: Vec<OutboxMessage> = messages
            .iter()
            .filter(|m| m.status == OutboxStatus::Pending && !claimed.contains(&m.id))
            .cloned()
            .collect();
        batch.sort_by_key(|m| m.occurred_at);
        batch.truncate(limit);

        for msg in &batch {
            claimed.insert(msg.id);
        }

        Ok(batch)
    }

    async fn mark_published(&self, id: MessageId) -> Result<()> {
        let mut messages = self.messages.write().await;
        let msg = messages
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or(OutboxError::MessageNotFound(id))?;
        msg.status = OutboxStatus::Published;
        msg.published_at = Some(chrono::Utc::now());
        self.claimed.write().await.remove(&id);
        Ok(())
    }

    async fn release(&self, id: MessageId, error: &str) -> Result<()> {
        let mut messages = self.messages.write().await;
        let msg = messages
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or(OutboxError::MessageNotFound(id))?;
        msg.retry_count += 1;
        msg.last_error = Some(error.to_string());
        self.claimed.write().await.remove(&id);
        Ok(())
    }

    async fn mark_failed(&self, id: MessageId, error: &str) -> Result<()> {
        let mut messages = self.messages.write().await;
        let msg = messages
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or(OutboxError::MessageNotFound(id))?;
        msg.status = OutboxStatus::Failed;
        msg.last_error = Some(error.to_string());
        self.claimed.write().await.remove(&id);
        Ok(())
    }

    async fn dead_letters(&self) -> Result<Vec<OutboxMessage>> {
        Ok(self.messages_with_status(OutboxStatus::Failed).await)
    }

    async fn pending_count(&self) -> Result<usize> {
        Ok(self
            .messages
            .read()
            .await
            .iter()
            .filter(|m| m.status == OutboxStatus::Pending)
            .count())
    }
}

#[async_trait]
impl TransactionalAppend for InMemoryOutboxStore {
    async fn append_and_stage(
        &self,
        events: Vec<EventEnvelope>,
        options: AppendOptions,
        messages: Vec<OutboxMessage>,
    ) -> Result<Version> {
        // Append first so a version conflict stages nothing
        let version = self.event_store.append(events, options).await?;
        self.stage(messages).await?;
        Ok(version)
    }
}
