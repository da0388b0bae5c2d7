//! Transactional outbox.
//!
//! Integration events are staged in the same transaction as the domain
//! events that produced them, then drained by a publisher loop with
//! at-least-once delivery. Consumers must tolerate duplicates; ordering
//! across messages is not guaranteed.

pub mod broker;
pub mod config;
pub mod error;
pub mod memory;
pub mod message;
pub mod postgres;
pub mod publisher;
pub mod registry;
pub mod store;

pub use broker::{InMemoryBroker, MessageBroker};
pub use config::PublisherConfig;
pub use error::{OutboxError, Result};
pub use memory::InMemoryOutboxStore;
pub use message::{MessageId, OutboxMessage, OutboxStatus};
pub use postgres::PostgresOutboxStore;
pub use publisher::{BatchOutcome, OutboxPublisher};
pub use registry::EventTypeRegistry;
pub use store::{OutboxStore, TransactionalAppend};
