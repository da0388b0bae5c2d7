use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use common::IntegrationEnvelope;
use tokio::sync::RwLock;

use crate::{OutboxError, Result};

/// Message broker abstraction used by the publisher.
///
/// Delivery is at-least-once: the publisher may call `publish` more
/// than once for the same envelope, and implementations must treat the
/// envelope ID as the deduplication key if they deduplicate at all.
#[async_trait]
pub trait MessageBroker: Send + Sync {
    /// Publishes an envelope to a topic.
    async fn publish(&self, topic: &str, envelope: &IntegrationEnvelope) -> Result<()>;
}

/// In-memory broker for testing.
///
/// Records every published envelope. `set_fail_publish` makes delivery
/// fail until cleared, for driving retry and dead-letter paths;
/// `set_delay` stalls delivery, for driving the publish timeout.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    published: Arc<RwLock<Vec<(String, IntegrationEnvelope)>>>,
    fail_publish: Arc<AtomicBool>,
    delay: Arc<RwLock<Option<Duration>>>,
}

impl InMemoryBroker {
    /// Creates a new in-memory broker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggles delivery failure.
    pub fn set_fail_publish(&self, fail: bool) {
        self.fail_publish.store(fail, Ordering::SeqCst);
    }

    /// Delays every publish by the given duration.
    pub async fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.write().await = delay;
    }

    /// Returns all published envelopes with their topics.
    pub async fn published(&self) -> Vec<(String, IntegrationEnvelope)> {
        self.published.read().await.clone()
    }

    /// Returns published envelopes for one topic.
    pub async fn published_on(&self, topic: &str) -> Vec<IntegrationEnvelope> {
        self.published
            .read()
            .await
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, e)| e.clone())
            .collect()
    }
}

#[async_trait]
impl MessageBroker for InMemoryBroker {
    async fn publish(&self, topic: &str, envelope: &IntegrationEnvelope) -> Result<()> {
        if let Some(delay) = *self.delay.read().await {
            tokio::time::sleep(delay).await;
        }
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(OutboxError::Publish("broker unavailable".to_string()));
        }
        self.published
            .write()
            .await
            .push((topic.to_string(), envelope.clone()));
        Ok(())
    }
}
