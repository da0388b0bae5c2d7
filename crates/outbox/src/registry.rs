use std::collections::HashSet;

use crate::{OutboxError, OutboxMessage, Result};

/// Registry of event types the publisher knows how to deliver.
///
/// Registration is explicit. A message whose event type is absent here
/// is dead-lettered on first sight, since no amount of retrying will
/// make an unknown type known.
#[derive(Debug, Clone, Default)]
pub struct EventTypeRegistry {
    types: HashSet<String>,
}

impl EventTypeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry preloaded with the organization integration
    /// event types.
    pub fn with_organization_events() -> Self {
        let mut registry = Self::new();
        registry.register("OrganizationCreated");
        registry.register("OrganizationUpdated");
        registry.register("OrganizationDeleted");
        registry
    }

    /// Registers an event type.
    pub fn register(&mut self, event_type: impl Into<String>) {
        self.types.insert(event_type.into());
    }

    /// Returns true if the event type is registered.
    pub fn contains(&self, event_type: &str) -> bool {
        self.types.contains(event_type)
    }

    /// Validates a message's event type before any delivery attempt.
    pub fn validate(&self, message: &OutboxMessage) -> Result<()> {
        if self.contains(&message.event_type) {
            Ok(())
        } else {
            Err(OutboxError::UnknownEventType(message.event_type.clone()))
        }
    }
}
