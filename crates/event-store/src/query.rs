use chrono::{DateTime, Utc};
use common::TenantId;

use crate::{AggregateId, EventEnvelope, Version};

/// Filter set for reading events across streams.
///
/// Every field is optional; an empty query matches everything. Backends
/// evaluate the same predicate, whether as a SQL `WHERE` clause or via
/// [`EventQuery::matches`] over in-memory streams.
#[derive(Debug, Clone, Default)]
pub struct EventQuery {
    /// Restrict to a single stream.
    pub aggregate_id: Option<AggregateId>,

    /// Restrict to one aggregate type.
    pub aggregate_type: Option<String>,

    /// Restrict to events owned by this tenant.
    pub tenant_id: Option<TenantId>,

    /// Restrict to any of these event types.
    pub event_types: Option<Vec<String>>,

    /// Lowest version to include.
    pub from_version: Option<Version>,

    /// Highest version to include.
    pub to_version: Option<Version>,

    /// Earliest timestamp to include.
    pub from_timestamp: Option<DateTime<Utc>>,

    /// Latest timestamp to include.
    pub to_timestamp: Option<DateTime<Utc>>,

    /// Cap on the number of events returned.
    pub limit: Option<usize>,

    /// Events to skip before returning results.
    pub offset: Option<usize>,
}

impl EventQuery {
    /// Creates a query that matches every event.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts the query to a single stream.
    pub fn aggregate_id(mut self, id: AggregateId) -> Self {
        self.aggregate_id = Some(id);
        self
    }

    /// Restricts the query to one aggregate type.
    pub fn aggregate_type(mut self, aggregate_type: impl Into<String>) -> Self {
        self.aggregate_type = Some(aggregate_type.into());
        self
    }

    /// Restricts the query to events owned by a tenant.
    pub fn tenant_id(mut self, tenant_id: TenantId) -> Self {
        self.tenant_id = Some(tenant_id);
        self
    }

    /// Restricts the query to a single event type.
    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_types = Some(vec![event_type.into()]);
        self
    }

    /// Restricts the query to any of the given event types.
    pub fn event_types(mut self, event_types: Vec<String>) -> Self {
        self.event_types = Some(event_types);
        self
    }

    /// Sets the lowest version to include.
    pub fn from_version(mut self, version: Version) -> Self {
        self.from_version = Some(version);
        self
    }

    /// Sets the highest version to include.
    pub fn to_version(mut self, version: Version) -> Self {
        self.to_version = Some(version);
        self
    }

    /// Sets the earliest timestamp to include.
    pub fn from_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.from_timestamp = Some(timestamp);
        self
    }

    /// Sets the latest timestamp to include.
    pub fn to_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.to_timestamp = Some(timestamp);
        self
    }

    /// Caps the number of events returned.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skips this many events before returning results.
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Whether an event passes every filter in this query.
    ///
    /// Ignores `limit` and `offset`; pagination is applied by the
    /// backend after filtering.
    pub fn matches(&self, event: &EventEnvelope) -> bool {
        if let Some(id) = self.aggregate_id
            && event.aggregate_id != id
        {
            return false;
        }
        if let Some(aggregate_type) = &self.aggregate_type
            && event.aggregate_type != *aggregate_type
        {
            return false;
        }
        if let Some(tenant_id) = self.tenant_id
            && event.tenant_id != Some(tenant_id)
        {
            return false;
        }
        if let Some(event_types) = &self.event_types
            && !event_types.iter().any(|t| *t == event.event_type)
        {
            return false;
        }
        if let Some(from) = self.from_version
            && event.version < from
        {
            return false;
        }
        if let Some(to) = self.to_version
            && event.version > to
        {
            return false;
        }
        if let Some(from) = self.from_timestamp
            && event.timestamp < from
        {
            return false;
        }
        if let Some(to) = self.to_timestamp
            && event.timestamp > to
        {
            return false;
        }
        true
    }
}
