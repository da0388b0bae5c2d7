//! Append-only event store.
//!
//! Each aggregate owns one stream of immutable events ordered by a
//! strictly increasing version. Appends race through optimistic
//! concurrency, never locks. Two backends: in-memory for tests and
//! PostgreSQL for production.

pub mod error;
pub mod event;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod snapshot;
pub mod store;

pub use common::AggregateId;
pub use error::{EventStoreError, Result};
pub use event::{EventEnvelope, EventEnvelopeBuilder, EventId, Version};
pub use memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use query::EventQuery;
pub use snapshot::Snapshot;
pub use store::{AppendOptions, EventStore, EventStoreExt, EventStream};
