use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::{AggregateId, EventEnvelope, EventQuery, EventStoreError, Result, Snapshot, Version};

/// Concurrency expectations for an append.
#[derive(Debug, Clone, Default)]
pub struct AppendOptions {
    /// Version the stream must be at for the append to go through.
    /// `None` skips the check entirely; reserve that for replays and
    /// migrations where no concurrent writer exists.
    pub expected_version: Option<Version>,
}

impl AppendOptions {
    /// Append without a version check.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append only if the stream is exactly at `version`.
    pub fn expect_version(version: Version) -> Self {
        Self {
            expected_version: Some(version),
        }
    }

    /// Append only if the stream has no events yet.
    ///
    /// An existing stream fails the append with `StreamAlreadyExists`.
    pub fn expect_new() -> Self {
        Self {
            expected_version: Some(Version::initial()),
        }
    }
}

/// Fallible stream of stored events.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<EventEnvelope>> + Send>>;

/// Persistence contract shared by every event store backend.
///
/// Implementations must be safe to share across tasks.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends a batch of events to one stream, all or nothing.
    ///
    /// With `options.expected_version` set, a stream at any other
    /// version fails with `ConcurrencyConflict`, and a stream that was
    /// expected to be new but is not fails with `StreamAlreadyExists`.
    ///
    /// Returns the stream's version after the batch lands.
    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Version>;

    /// Reads a whole stream in version order.
    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>>;

    /// Reads a stream's tail starting at `from_version`, inclusive.
    ///
    /// This is the replay path after loading a snapshot.
    async fn get_events_for_aggregate_from_version(
        &self,
        aggregate_id: AggregateId,
        from_version: Version,
    ) -> Result<Vec<EventEnvelope>>;

    /// Reads events across streams, filtered by [`EventQuery`].
    async fn query_events(&self, query: EventQuery) -> Result<Vec<EventEnvelope>>;

    /// Reads every event carrying the given type name.
    async fn get_events_by_type(&self, event_type: &str) -> Result<Vec<EventEnvelope>>;

    /// Streams the entire store in recorded order.
    async fn stream_all_events(&self) -> Result<EventStream>;

    /// Current version of a stream, `None` when it has no events.
    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>>;

    /// Stores a snapshot, replacing any earlier one for the stream.
    async fn save_snapshot(&self, snapshot: Snapshot) -> Result<()>;

    /// Latest snapshot for a stream, `None` when none was taken.
    async fn get_snapshot(&self, aggregate_id: AggregateId) -> Result<Option<Snapshot>>;
}

/// Convenience operations derived from [`EventStore`].
#[async_trait]
pub trait EventStoreExt: EventStore {
    /// Appends one event.
    async fn append_event(&self, event: EventEnvelope, options: AppendOptions) -> Result<Version> {
        self.append(vec![event], options).await
    }

    /// Whether the stream holds at least one event.
    async fn stream_exists(&self, aggregate_id: AggregateId) -> Result<bool> {
        Ok(self.get_aggregate_version(aggregate_id).await?.is_some())
    }

    /// Loads what rehydration needs: the latest snapshot, when one
    /// exists, plus every event after it.
    async fn load_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<(Option<Snapshot>, Vec<EventEnvelope>)> {
        if let Some(snapshot) = self.get_snapshot(aggregate_id).await? {
            let events = self
                .get_events_for_aggregate_from_version(aggregate_id, snapshot.version.next())
                .await?;
            Ok((Some(snapshot), events))
        } else {
            let events = self.get_events_for_aggregate(aggregate_id).await?;
            Ok((None, events))
        }
    }
}

impl<T: EventStore + ?Sized> EventStoreExt for T {}

/// Checks a batch is appendable: non-empty, single-stream, and
/// sequentially versioned.
pub fn validate_events_for_append(events: &[EventEnvelope]) -> Result<()> {
    let Some(first) = events.first() else {
        return Err(EventStoreError::InvalidBatch(
            "cannot append an empty batch".to_string(),
        ));
    };

    for pair in events.windows(2) {
        let (prev, event) = (&pair[0], &pair[1]);
        if event.aggregate_id != first.aggregate_id {
            return Err(EventStoreError::InvalidBatch(
                "batch spans more than one stream".to_string(),
            ));
        }
        if event.aggregate_type != first.aggregate_type {
            return Err(EventStoreError::InvalidBatch(
                "batch mixes aggregate types".to_string(),
            ));
        }
        if event.version != prev.version.next() {
            return Err(EventStoreError::InvalidBatch(format!(
                "versions must be sequential: {} does not follow {}",
                event.version, prev.version
            )));
        }
    }

    Ok(())
}

/// Maps a version mismatch to the appropriate typed error.
///
/// Expecting a new stream but finding one is `StreamAlreadyExists`;
/// any other mismatch is a `ConcurrencyConflict`.
pub(crate) fn version_conflict(
    aggregate_id: AggregateId,
    expected: Version,
    actual: Version,
) -> EventStoreError {
    if expected == Version::initial() && actual > Version::initial() {
        EventStoreError::StreamAlreadyExists {
            aggregate_id,
            actual,
        }
    } else {
        EventStoreError::ConcurrencyConflict {
            aggregate_id,
            expected,
            actual,
        }
    }
}
