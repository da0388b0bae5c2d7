//! Integration consumer dispatching envelopes to registered handlers.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::IntegrationEnvelope;
use tokio::sync::RwLock;

use crate::Result;
use crate::error::ProjectionError;
use crate::handler::{ApplyOutcome, IntegrationHandler};

/// An envelope the consumer could not process.
#[derive(Debug, Clone)]
pub struct DeadLetteredEnvelope {
    pub envelope: IntegrationEnvelope,
    pub reason: String,
    pub dead_lettered_at: DateTime<Utc>,
}

/// Dispatches integration envelopes through an explicit handler
/// registry.
///
/// The registry is built once at startup; an envelope whose event type
/// has no registered handler is a typed error and lands on the consumer
/// dead-letter list, never silently dropped. Unknown event types are
/// not retried.
pub struct IntegrationConsumer {
    handlers: HashMap<&'static str, Arc<dyn IntegrationHandler>>,
    dead_letters: Arc<RwLock<Vec<DeadLetteredEnvelope>>>,
}

impl IntegrationConsumer {
    /// Creates a consumer with an empty registry.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            dead_letters: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Registers a handler for every event type it declares.
    ///
    /// A later registration for the same event type replaces the
    /// earlier one.
    pub fn register(&mut self, handler: Arc<dyn IntegrationHandler>) {
        for event_type in handler.event_types().iter().copied() {
            self.handlers.insert(event_type, Arc::clone(&handler));
        }
    }

    /// Returns the number of distinct event types with a handler.
    pub fn registered_event_types(&self) -> usize {
        self.handlers.len()
    }

    /// Handles a single envelope.
    ///
    /// Deserialization failures and missing handlers are recorded to
    /// the dead-letter list before the error is returned.
    #[tracing::instrument(skip(self, envelope), fields(event_type = %envelope.event_type))]
    pub async fn handle(&self, envelope: &IntegrationEnvelope) -> Result<ApplyOutcome> {
        let Some(handler) = self.handlers.get(envelope.event_type.as_str()) else {
            let error = ProjectionError::UnknownEventType(envelope.event_type.clone());
            self.dead_letter(envelope, &error).await;
            return Err(error);
        };

        match handler.handle(envelope).await {
            Ok(outcome) => Ok(outcome),
            Err(error) => {
                self.dead_letter(envelope, &error).await;
                Err(error)
            }
        }
    }

    /// Returns the envelopes that could not be processed.
    pub async fn dead_letters(&self) -> Vec<DeadLetteredEnvelope> {
        self.dead_letters.read().await.clone()
    }

    async fn dead_letter(&self, envelope: &IntegrationEnvelope, error: &ProjectionError) {
        metrics::counter!("consumer_events_dead_lettered").increment(1);
        tracing::warn!(
            event_type = %envelope.event_type,
            error = %error,
            "dead-lettering envelope"
        );

        self.dead_letters.write().await.push(DeadLetteredEnvelope {
            envelope: envelope.clone(),
            reason: error.to_string(),
            dead_lettered_at: Utc::now(),
        });
    }
}

impl Default for IntegrationConsumer {
    fn default() -> Self {
        Self::new()
    }
}
