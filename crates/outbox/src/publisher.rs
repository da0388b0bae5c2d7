use std::sync::Arc;

use tokio::time::{sleep, timeout};

use crate::{
    EventTypeRegistry, MessageBroker, OutboxError, OutboxMessage, PublisherConfig, Result,
    config::retry_cooldown, store::OutboxStore,
};

/// Outcome of one publish cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Messages acknowledged by the broker.
    pub published: usize,
    /// Messages returned to the pending pool after a transient failure.
    pub released: usize,
    /// Messages dead-lettered in this cycle.
    pub dead_lettered: usize,
}

impl BatchOutcome {
    /// Total messages touched in this cycle.
    pub fn total(&self) -> usize {
        self.published + self.released + self.dead_lettered
    }
}

/// Background publisher that drains the outbox to the broker.
///
/// Each cycle claims a batch of pending messages oldest first and
/// attempts delivery. Broker calls run under `publish_timeout`; an
/// elapsed timeout counts as a transient failure. Transient failures
/// release the message for a later cycle with a short cooldown; after
/// `max_retries` attempts the message is dead-lettered. Messages with
/// an unknown event type are dead-lettered immediately.
///
/// Delivery is at-least-once. A crash after the broker acknowledges
/// but before the row is marked published causes redelivery on
/// restart, never loss.
pub struct OutboxPublisher<S, B> {
    store: Arc<S>,
    broker: Arc<B>,
    registry: EventTypeRegistry,
    config: PublisherConfig,
}

impl<S, B> OutboxPublisher<S, B>
where
    S: OutboxStore,
    B: MessageBroker,
{
    /// Creates a new publisher.
    pub fn new(
        store: Arc<S>,
        broker: Arc<B>,
        registry: EventTypeRegistry,
        config: PublisherConfig,
    ) -> Self {
        Self {
            store,
            broker,
            registry,
            config,
        }
    }

    /// Runs the publisher loop until the task is aborted.
    pub async fn run(&self) {
        tracing::info!(
            batch_size = self.config.batch_size,
            max_retries = self.config.max_retries,
            "starting outbox publisher"
        );

        let mut failed_cycles: u32 = 0;

        loop {
            match self.publish_batch().await {
                Ok(outcome) => {
                    if outcome.total() > 0 {
                        tracing::debug!(
                            published = outcome.published,
                            released = outcome.released,
                            dead_lettered = outcome.dead_lettered,
                            "outbox cycle complete"
                        );
                    }
                    if outcome.released > 0 {
                        // Give the broker a moment before retrying
                        sleep(retry_cooldown(failed_cycles)).await;
                        failed_cycles += 1;
                        continue;
                    }
                    failed_cycles = 0;
                }
                Err(e) => {
                    tracing::error!(error = %e, "outbox cycle failed");
                }
            }

            sleep(self.config.poll_interval).await;
        }
    }

    /// Claims one batch and attempts delivery of every message in it.
    #[tracing::instrument(skip(self))]
    pub async fn publish_batch(&self) -> Result<BatchOutcome> {
        let batch = self.store.claim_pending(self.config.batch_size).await?;
        let mut outcome = BatchOutcome::default();

        for message in batch {
            match self.deliver(&message).await {
                Delivery::Published => outcome.published += 1,
                Delivery::Released => outcome.released += 1,
                Delivery::DeadLettered => outcome.dead_lettered += 1,
            }
        }

        Ok(outcome)
    }

    /// Repeatedly publishes batches until the pending pool is empty or
    /// every remaining message is awaiting its retry cooldown.
    ///
    /// Intended for tests and for graceful shutdown draining.
    pub async fn drain(&self) -> Result<BatchOutcome> {
        let mut total = BatchOutcome::default();
        let mut failed_cycles: u32 = 0;
        loop {
            let outcome = self.publish_batch().await?;
            total.published += outcome.published;
            total.released += outcome.released;
            total.dead_lettered += outcome.dead_lettered;

            if outcome.released > 0 {
                sleep(retry_cooldown(failed_cycles)).await;
                failed_cycles += 1;
                continue;
            }
            failed_cycles = 0;
            if outcome.total() == 0 {
                return Ok(total);
            }
        }
    }

    async fn deliver(&self, message: &OutboxMessage) -> Delivery {
        if let Err(e) = self.registry.validate(message) {
            return self.dead_letter(message, &e).await;
        }

        let envelope = match message.envelope() {
            Ok(envelope) => envelope,
            // Corrupted payload, retrying cannot help
            Err(e) => return self.dead_letter(message, &e).await,
        };

        // A hung broker would otherwise hold the claim forever
        let publish = timeout(
            self.config.publish_timeout,
            self.broker.publish(&message.topic, &envelope),
        )
        .await
        .unwrap_or_else(|_| {
            Err(OutboxError::Publish(format!(
                "broker publish timed out after {}ms",
                self.config.publish_timeout.as_millis()
            )))
        });

        match publish {
            Ok(()) => {
                if let Err(e) = self.store.mark_published(message.id).await {
                    // The broker has the message; redelivery is possible
                    // but loss is not
                    tracing::error!(message_id = %message.id, error = %e, "failed to mark published");
                    return Delivery::Released;
                }
                metrics::counter!("outbox_messages_published").increment(1);
                Delivery::Published
            }
            Err(e) => {
                if message.retry_count + 1 >= self.config.max_retries {
                    self.dead_letter(message, &e).await
                } else {
                    tracing::warn!(
                        message_id = %message.id,
                        event_type = %message.event_type,
                        retry_count = message.retry_count,
                        error = %e,
                        "publish failed, releasing for retry"
                    );
                    if let Err(release_err) =
                        self.store.release(message.id, &e.to_string()).await
                    {
                        tracing::error!(message_id = %message.id, error = %release_err, "failed to release message");
                    }
                    metrics::counter!("outbox_messages_released").increment(1);
                    Delivery::Released
                }
            }
        }
    }

    async fn dead_letter(&self, message: &OutboxMessage, cause: &dyn std::fmt::Display) -> Delivery {
        tracing::error!(
            message_id = %message.id,
            event_type = %message.event_type,
            retry_count = message.retry_count,
            error = %cause,
            "dead-lettering outbox message"
        );
        if let Err(e) = self.store.mark_failed(message.id, &cause.to_string()).await {
            tracing::error!(message_id = %message.id, error = %e, "failed to dead-letter message");
        }
        metrics::counter!("outbox_messages_dead_lettered").increment(1);
        Delivery::DeadLettered
    }
}

enum Delivery {
    Published,
    Released,
    DeadLettered,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InMemoryBroker, InMemoryOutboxStore, OutboxStatus};
    use common::{
        AggregateId, CorrelationId, IntegrationEnvelope, ORGANIZATIONS_TOPIC,
        OrganizationIntegrationEvent, TenantId,
    };

    fn make_publisher(
        store: Arc<InMemoryOutboxStore>,
        broker: Arc<InMemoryBroker>,
    ) -> OutboxPublisher<InMemoryOutboxStore, InMemoryBroker> {
        OutboxPublisher::new(
            store,
            broker,
            EventTypeRegistry::with_organization_events(),
            PublisherConfig::default(),
        )
    }

    fn created_message() -> OutboxMessage {
        let event = OrganizationIntegrationEvent::organization_created(
            AggregateId::new(),
            TenantId::new(),
            "Acme",
            "ext-123",
        );
        let envelope = IntegrationEnvelope::wrap(
            event.event_type(),
            &event,
            chrono::Utc::now(),
            CorrelationId::new(),
        )
        .unwrap();
        OutboxMessage::new(ORGANIZATIONS_TOPIC, &envelope).unwrap()
    }

    fn message_with_type(event_type: &str) -> OutboxMessage {
        let envelope = IntegrationEnvelope::wrap(
            event_type,
            &serde_json::json!({}),
            chrono::Utc::now(),
            CorrelationId::new(),
        )
        .unwrap();
        OutboxMessage::new(ORGANIZATIONS_TOPIC, &envelope).unwrap()
    }

    #[tokio::test]
    async fn publishes_pending_message() {
        let store = Arc::new(InMemoryOutboxStore::new());
        let broker = Arc::new(InMemoryBroker::new());
        let publisher = make_publisher(store.clone(), broker.clone());

        let msg = created_message();
        let id = msg.id;
        store.stage(vec![msg]).await.unwrap();

        let outcome = publisher.publish_batch().await.unwrap();
        assert_eq!(outcome.published, 1);

        let published = broker.published_on(ORGANIZATIONS_TOPIC).await;
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].event_type, "OrganizationCreated");

        let stored = store.get(id).await.unwrap();
        assert_eq!(stored.status, OutboxStatus::Published);
    }

    #[tokio::test]
    async fn transient_failure_releases_then_succeeds() {
        let store = Arc::new(InMemoryOutboxStore::new());
        let broker = Arc::new(InMemoryBroker::new());
        let publisher = make_publisher(store.clone(), broker.clone());

        let msg = created_message();
        let id = msg.id;
        store.stage(vec![msg]).await.unwrap();

        broker.set_fail_publish(true);
        let outcome = publisher.publish_batch().await.unwrap();
        assert_eq!(outcome.released, 1);

        let stored = store.get(id).await.unwrap();
        assert_eq!(stored.status, OutboxStatus::Pending);
        assert_eq!(stored.retry_count, 1);
        assert!(stored.last_error.is_some());

        broker.set_fail_publish(false);
        let outcome = publisher.publish_batch().await.unwrap();
        assert_eq!(outcome.published, 1);
        assert_eq!(broker.published_on(ORGANIZATIONS_TOPIC).await.len(), 1);
    }

    #[tokio::test]
    async fn slow_broker_times_out_and_releases() {
        let store = Arc::new(InMemoryOutboxStore::new());
        let broker = Arc::new(InMemoryBroker::new());
        broker.set_delay(Some(std::time::Duration::from_millis(200))).await;

        let publisher = OutboxPublisher::new(
            store.clone(),
            broker.clone(),
            EventTypeRegistry::with_organization_events(),
            PublisherConfig {
                publish_timeout: std::time::Duration::from_millis(10),
                ..PublisherConfig::default()
            },
        );

        let msg = created_message();
        let id = msg.id;
        store.stage(vec![msg]).await.unwrap();

        let outcome = publisher.publish_batch().await.unwrap();
        assert_eq!(outcome.released, 1);
        assert_eq!(outcome.published, 0);

        let stored = store.get(id).await.unwrap();
        assert_eq!(stored.status, OutboxStatus::Pending);
        assert_eq!(stored.retry_count, 1);
        assert!(stored.last_error.unwrap().contains("timed out"));

        // Delivery succeeds once the broker answers within budget
        broker.set_delay(None).await;
        let outcome = publisher.publish_batch().await.unwrap();
        assert_eq!(outcome.published, 1);
    }

    #[tokio::test]
    async fn retries_exhausted_dead_letters_message() {
        let store = Arc::new(InMemoryOutboxStore::new());
        let broker = Arc::new(InMemoryBroker::new());
        let publisher = make_publisher(store.clone(), broker.clone());

        let msg = created_message();
        let id = msg.id;
        store.stage(vec![msg]).await.unwrap();
        broker.set_fail_publish(true);

        // Default max_retries is 3: two releases then a dead-letter
        let outcome = publisher.publish_batch().await.unwrap();
        assert_eq!(outcome.released, 1);
        let outcome = publisher.publish_batch().await.unwrap();
        assert_eq!(outcome.released, 1);
        let outcome = publisher.publish_batch().await.unwrap();
        assert_eq!(outcome.dead_lettered, 1);

        let dead = store.dead_letters().await.unwrap();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].id, id);

        // Dead letters stay out of later cycles
        let outcome = publisher.publish_batch().await.unwrap();
        assert_eq!(outcome.total(), 0);
        assert!(broker.published_on(ORGANIZATIONS_TOPIC).await.is_empty());
    }

    #[tokio::test]
    async fn unknown_event_type_dead_letters_without_retry() {
        let store = Arc::new(InMemoryOutboxStore::new());
        let broker = Arc::new(InMemoryBroker::new());
        let publisher = make_publisher(store.clone(), broker.clone());

        let msg = message_with_type("SomethingNobodyKnows");
        let id = msg.id;
        store.stage(vec![msg]).await.unwrap();

        let outcome = publisher.publish_batch().await.unwrap();
        assert_eq!(outcome.dead_lettered, 1);
        assert_eq!(outcome.released, 0);

        let stored = store.get(id).await.unwrap();
        assert_eq!(stored.status, OutboxStatus::Failed);
        assert_eq!(stored.retry_count, 0);
        assert!(broker.published().await.is_empty());
    }

    #[tokio::test]
    async fn drain_empties_pending_pool() {
        let store = Arc::new(InMemoryOutboxStore::new());
        let broker = Arc::new(InMemoryBroker::new());
        let publisher = make_publisher(store.clone(), broker.clone());

        store
            .stage(vec![created_message(), created_message(), created_message()])
            .await
            .unwrap();

        let outcome = publisher.drain().await.unwrap();
        assert_eq!(outcome.published, 3);
        assert_eq!(store.pending_count().await.unwrap(), 0);
        assert_eq!(broker.published_on(ORGANIZATIONS_TOPIC).await.len(), 3);
    }

    #[tokio::test]
    async fn batch_mixes_outcomes_independently() {
        let store = Arc::new(InMemoryOutboxStore::new());
        let broker = Arc::new(InMemoryBroker::new());
        let publisher = make_publisher(store.clone(), broker.clone());

        store
            .stage(vec![created_message(), message_with_type("Bogus")])
            .await
            .unwrap();

        let outcome = publisher.publish_batch().await.unwrap();
        assert_eq!(outcome.published, 1);
        assert_eq!(outcome.dead_lettered, 1);
    }
}
