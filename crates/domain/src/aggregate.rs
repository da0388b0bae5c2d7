//! Aggregate and domain event abstractions.

use common::AggregateId;
use event_store::Version;
use serde::{Serialize, de::DeserializeOwned};

/// A fact recorded on an aggregate's stream.
///
/// Domain events are immutable and named in past tense. They stay
/// private to the owning service; only integration events cross
/// service boundaries.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// Name stored in the event envelope and matched by stream queries.
    fn event_type(&self) -> &'static str;
}

/// State that is a pure fold of a domain event stream.
///
/// Commands validate against folded state elsewhere; `apply` only
/// folds. It must be deterministic, side-effect free, and infallible,
/// since every event it sees already happened.
pub trait Aggregate: Default + Send + Sync + Sized {
    /// Events this aggregate emits and folds.
    type Event: DomainEvent;

    /// Command rejection type.
    type Error: std::error::Error + Send + Sync;

    /// Name under which this aggregate's streams are stored.
    fn aggregate_type() -> &'static str;

    /// Identity of the stream, absent until the first event is folded.
    fn id(&self) -> Option<AggregateId>;

    /// Version of the last folded event, [`Version::initial`] when none.
    fn version(&self) -> Version;

    /// Records the stream position after rehydration.
    fn set_version(&mut self, version: Version);

    /// Folds one event into the state.
    fn apply(&mut self, event: Self::Event);

    /// Folds a sequence of events in order.
    fn apply_events(&mut self, events: impl IntoIterator<Item = Self::Event>) {
        for event in events {
            self.apply(event);
        }
    }
}

/// Aggregates whose folded state can be cached as a snapshot.
///
/// Snapshots only shorten replay. Deleting every snapshot changes
/// nothing but the next load's cost.
pub trait SnapshotCapable: Aggregate + Serialize + DeserializeOwned {
    /// Events between snapshot captures.
    fn snapshot_interval() -> usize {
        100
    }

    /// Whether the current version sits on a capture boundary.
    fn should_snapshot(&self) -> bool {
        self.version().as_i64() > 0
            && (self.version().as_i64() as usize).is_multiple_of(Self::snapshot_interval())
    }
}
