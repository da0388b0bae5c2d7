//! Command execution against event-sourced aggregates.

use std::marker::PhantomData;

use common::{AggregateId, CausationId, CorrelationId, TenantId};
use event_store::{AppendOptions, EventEnvelope, EventStore, EventStoreExt, Snapshot, Version};
use outbox::{OutboxMessage, TransactionalAppend};
use serde::Serialize;

use crate::aggregate::{Aggregate, DomainEvent, SnapshotCapable};
use crate::error::DomainError;

/// What a successful command left behind.
#[derive(Debug)]
pub struct CommandResult<A: Aggregate> {
    /// Aggregate state with the new events folded in.
    pub aggregate: A,

    /// Events the command produced, already persisted.
    pub events: Vec<A::Event>,

    /// Stream version after the append.
    pub new_version: Version,
}

/// Explicit execution context carried by every command.
///
/// Tenant, correlation, and causation identifiers are passed here by
/// the caller and stamped onto every persisted event. Nothing is
/// resolved from ambient state.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventContext {
    pub tenant_id: Option<TenantId>,
    pub correlation_id: Option<CorrelationId>,
    pub causation_id: Option<CausationId>,
}

impl EventContext {
    /// Context with no identifiers set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Context owned by a tenant.
    pub fn for_tenant(tenant_id: TenantId) -> Self {
        Self {
            tenant_id: Some(tenant_id),
            ..Self::default()
        }
    }

    /// Tags the context with a workflow correlation ID.
    pub fn correlation(mut self, correlation_id: CorrelationId) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    /// Tags the context with the ID of the message that caused it.
    pub fn causation(mut self, causation_id: CausationId) -> Self {
        self.causation_id = Some(causation_id);
        self
    }
}

/// An intention to change one aggregate.
///
/// The aggregate's folded state decides whether the intention is
/// honored or rejected.
pub trait Command: Send + Sync {
    /// Aggregate the command targets.
    type Aggregate: Aggregate;

    /// Stream the command targets.
    fn aggregate_id(&self) -> AggregateId;
}

/// Runs commands through the load, decide, append cycle.
///
/// Rehydrates the aggregate (snapshot plus tail when available), hands
/// it to the command closure, persists whatever events come back under
/// an optimistic version check, and optionally stages outbox messages
/// in the same commit.
pub struct CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    store: S,
    _phantom: PhantomData<A>,
}

impl<S, A> CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            _phantom: PhantomData,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Rehydrates an aggregate, yielding the default state for a
    /// stream that has no events.
    pub async fn load(&self, aggregate_id: AggregateId) -> Result<A, DomainError>
    where
        A: for<'de> serde::Deserialize<'de>,
        A::Event: for<'de> serde::Deserialize<'de>,
    {
        let (snapshot, events) = self.store.load_aggregate(aggregate_id).await?;

        let mut aggregate = match snapshot {
            Some(snapshot) => snapshot.into_state()?,
            None => A::default(),
        };

        for envelope in events {
            let event: A::Event = serde_json::from_value(envelope.payload)?;
            aggregate.apply(event);
            aggregate.set_version(envelope.version);
        }

        Ok(aggregate)
    }

    /// Rehydrates an aggregate, yielding `None` for an empty stream.
    pub async fn load_existing(&self, aggregate_id: AggregateId) -> Result<Option<A>, DomainError>
    where
        A: for<'de> serde::Deserialize<'de>,
        A::Event: for<'de> serde::Deserialize<'de>,
    {
        let aggregate = self.load(aggregate_id).await?;
        Ok(aggregate.id().is_some().then_some(aggregate))
    }

    /// Runs a command and persists what it produces.
    ///
    /// The closure sees the rehydrated state and returns the events to
    /// record, or a rejection. A command that returns no events leaves
    /// the stream untouched.
    pub async fn execute<F>(
        &self,
        aggregate_id: AggregateId,
        ctx: EventContext,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        A: for<'de> serde::Deserialize<'de>,
        A::Event: for<'de> serde::Deserialize<'de> + Serialize,
        F: FnOnce(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        let mut aggregate = self.load(aggregate_id).await?;
        let current_version = aggregate.version();

        let events = command_fn(&aggregate)?;
        if events.is_empty() {
            return Ok(CommandResult {
                aggregate,
                events,
                new_version: current_version,
            });
        }

        let envelopes = self.build_envelopes(aggregate_id, current_version, ctx, &events)?;
        let new_version = self
            .store
            .append(envelopes, append_options_for(current_version))
            .await?;

        for event in &events {
            aggregate.apply(event.clone());
        }
        aggregate.set_version(new_version);

        Ok(CommandResult {
            aggregate,
            events,
            new_version,
        })
    }

    /// Runs a command and atomically stages outbox messages with the
    /// resulting events.
    ///
    /// `message_fn` runs after the command succeeds and receives the
    /// post-command aggregate state and the new events; the messages it
    /// returns commit in the same transaction as the events. A version
    /// conflict persists and stages nothing. Commands that produce no
    /// events stage no messages.
    pub async fn execute_with_outbox<T, F, M>(
        &self,
        outbox: &T,
        aggregate_id: AggregateId,
        ctx: EventContext,
        command_fn: F,
        message_fn: M,
    ) -> Result<CommandResult<A>, DomainError>
    where
        A: for<'de> serde::Deserialize<'de>,
        A::Event: for<'de> serde::Deserialize<'de> + Serialize,
        T: TransactionalAppend,
        F: FnOnce(&A) -> Result<Vec<A::Event>, A::Error>,
        M: FnOnce(&A, &[A::Event]) -> Result<Vec<OutboxMessage>, DomainError>,
        DomainError: From<A::Error>,
    {
        let mut aggregate = self.load(aggregate_id).await?;
        let current_version = aggregate.version();

        let events = command_fn(&aggregate)?;
        if events.is_empty() {
            return Ok(CommandResult {
                aggregate,
                events,
                new_version: current_version,
            });
        }

        let envelopes = self.build_envelopes(aggregate_id, current_version, ctx, &events)?;

        // Fold first so message_fn sees post-command state
        for event in &events {
            aggregate.apply(event.clone());
        }

        let messages = message_fn(&aggregate, &events)?;
        let new_version = outbox
            .append_and_stage(envelopes, append_options_for(current_version), messages)
            .await?;
        aggregate.set_version(new_version);

        Ok(CommandResult {
            aggregate,
            events,
            new_version,
        })
    }

    fn build_envelopes(
        &self,
        aggregate_id: AggregateId,
        current_version: Version,
        ctx: EventContext,
        events: &[A::Event],
    ) -> Result<Vec<EventEnvelope>, DomainError>
    where
        A::Event: Serialize,
    {
        let mut envelopes = Vec::with_capacity(events.len());
        let mut version = current_version;

        for event in events {
            version = version.next();
            let mut builder = EventEnvelope::builder()
                .aggregate_id(aggregate_id)
                .aggregate_type(A::aggregate_type())
                .event_type(event.event_type())
                .version(version)
                .payload(event)?;

            if let Some(tenant_id) = ctx.tenant_id {
                builder = builder.tenant_id(tenant_id);
            }
            if let Some(correlation_id) = ctx.correlation_id {
                builder = builder.correlation_id(correlation_id);
            }
            if let Some(causation_id) = ctx.causation_id {
                builder = builder.causation_id(causation_id);
            }

            envelopes.push(builder.build());
        }

        Ok(envelopes)
    }
}

impl<S, A> CommandHandler<S, A>
where
    S: EventStore,
    A: SnapshotCapable,
{
    /// Runs a command and captures a snapshot when the aggregate lands
    /// on a capture boundary.
    pub async fn execute_with_snapshot<F>(
        &self,
        aggregate_id: AggregateId,
        ctx: EventContext,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        A: for<'de> serde::Deserialize<'de>,
        A::Event: for<'de> serde::Deserialize<'de> + Serialize,
        F: FnOnce(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        let result = self.execute(aggregate_id, ctx, command_fn).await?;

        if result.aggregate.should_snapshot() {
            let snapshot = Snapshot::from_state(
                aggregate_id,
                A::aggregate_type(),
                result.new_version,
                &result.aggregate,
            )?;
            self.store.save_snapshot(snapshot).await?;
        }

        Ok(result)
    }
}

fn append_options_for(current_version: Version) -> AppendOptions {
    if current_version == Version::initial() {
        AppendOptions::expect_new()
    } else {
        AppendOptions::expect_version(current_version)
    }
}
