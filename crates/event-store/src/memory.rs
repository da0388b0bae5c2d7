use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    AggregateId, EventEnvelope, EventQuery, Result, Snapshot, Version,
    store::{AppendOptions, EventStore, EventStream, validate_events_for_append, version_conflict},
};

#[derive(Default)]
struct MemoryState {
    streams: HashMap<AggregateId, Vec<EventEnvelope>>,
    snapshots: HashMap<AggregateId, Snapshot>,
}

impl MemoryState {
    fn stream_version(&self, aggregate_id: AggregateId) -> Version {
        self.streams
            .get(&aggregate_id)
            .and_then(|events| events.last())
            .map(|e| e.version)
            .unwrap_or(Version::initial())
    }

    fn all_events_ordered(&self) -> Vec<EventEnvelope> {
        let mut events: Vec<EventEnvelope> =
            self.streams.values().flatten().cloned().collect();
        events.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then(a.event_id.as_uuid().cmp(&b.event_id.as_uuid()))
        });
        events
    }
}

/// Event store backed by process memory, for tests and benchmarks.
///
/// Events live in one `Vec` per stream, already in version order, so
/// version checks reduce to looking at the last element under the
/// write lock. Behaves like the Postgres backend for every trait
/// operation, including the append error taxonomy.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    state: Arc<RwLock<MemoryState>>,
}

impl InMemoryEventStore {
    /// Creates a new empty in-memory event store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of events across all streams.
    pub async fn event_count(&self) -> usize {
        self.state.read().await.streams.values().map(Vec::len).sum()
    }

    /// Clears all events and snapshots.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.streams.clear();
        state.snapshots.clear();
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Version> {
        validate_events_for_append(&events)?;

        let aggregate_id = events[0].aggregate_id;
        let mut state = self.state.write().await;
        let current = state.stream_version(aggregate_id);

        if let Some(expected) = options.expected_version
            && current != expected
        {
            return Err(version_conflict(aggregate_id, expected, current));
        }

        // Same check the unique (aggregate_id, version) index enforces
        if events[0].version <= current && current != Version::initial() {
            return Err(version_conflict(
                aggregate_id,
                options.expected_version.unwrap_or(current),
                current,
            ));
        }

        let new_version = events
            .last()
            .map(|e| e.version)
            .unwrap_or(Version::initial());
        state.streams.entry(aggregate_id).or_default().extend(events);

        Ok(new_version)
    }

    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        let state = self.state.read().await;
        Ok(state.streams.get(&aggregate_id).cloned().unwrap_or_default())
    }

    async fn get_events_for_aggregate_from_version(
        &self,
        aggregate_id: AggregateId,
        from_version: Version,
    ) -> Result<Vec<EventEnvelope>> {
        let state = self.state.read().await;
        Ok(state
            .streams
            .get(&aggregate_id)
            .map(|events| {
                events
                    .iter()
                    .filter(|e| e.version >= from_version)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn query_events(&self, query: EventQuery) -> Result<Vec<EventEnvelope>> {
        let state = self.state.read().await;

        let mut events: Vec<EventEnvelope> = state
            .streams
            .values()
            .flatten()
            .filter(|e| query.matches(e))
            .cloned()
            .collect();

        events.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then(a.version.cmp(&b.version))
        });

        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(events.into_iter().skip(offset).take(limit).collect())
    }

    async fn get_events_by_type(&self, event_type: &str) -> Result<Vec<EventEnvelope>> {
        let state = self.state.read().await;
        let mut events: Vec<EventEnvelope> = state
            .streams
            .values()
            .flatten()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect();
        events.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(events)
    }

    async fn stream_all_events(&self) -> Result<EventStream> {
        let events = self.state.read().await.all_events_ordered();
        Ok(Box::pin(futures_util::stream::iter(
            events.into_iter().map(Ok),
        )))
    }

    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        let state = self.state.read().await;
        Ok(state
            .streams
            .get(&aggregate_id)
            .and_then(|events| events.last())
            .map(|e| e.version))
    }

    async fn save_snapshot(&self, snapshot: Snapshot) -> Result<()> {
        self.state
            .write()
            .await
            .snapshots
            .insert(snapshot.aggregate_id, snapshot);
        Ok(())
    }

    async fn get_snapshot(&self, aggregate_id: AggregateId) -> Result<Option<Snapshot>> {
        Ok(self.state.read().await.snapshots.get(&aggregate_id).cloned())
    }
}
