use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CausationId, CorrelationId, TenantId};
use sqlx::{PgPool, Postgres, QueryBuilder, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    AggregateId, EventEnvelope, EventId, EventQuery, EventStoreError, Result, Snapshot, Version,
    store::{AppendOptions, EventStore, EventStream, validate_events_for_append, version_conflict},
};

const EVENT_COLUMNS: &str = "id, event_type, aggregate_id, aggregate_type, version, \
     timestamp, payload, tenant_id, correlation_id, causation_id";

fn decode_event_row(row: PgRow) -> Result<EventEnvelope> {
    Ok(EventEnvelope {
        event_id: EventId::from_uuid(row.try_get::<Uuid, _>("id")?),
        event_type: row.try_get("event_type")?,
        aggregate_id: AggregateId::from_uuid(row.try_get::<Uuid, _>("aggregate_id")?),
        aggregate_type: row.try_get("aggregate_type")?,
        version: Version::new(row.try_get("version")?),
        timestamp: row.try_get("timestamp")?,
        payload: row.try_get("payload")?,
        tenant_id: row
            .try_get::<Option<Uuid>, _>("tenant_id")?
            .map(TenantId::from_uuid),
        correlation_id: row
            .try_get::<Option<Uuid>, _>("correlation_id")?
            .map(CorrelationId::from_uuid),
        causation_id: row
            .try_get::<Option<Uuid>, _>("causation_id")?
            .map(CausationId::from_uuid),
    })
}

async fn stream_version_in_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    aggregate_id: AggregateId,
) -> Result<Version> {
    let max: Option<i64> =
        sqlx::query_scalar("SELECT MAX(version) FROM events WHERE aggregate_id = $1")
            .bind(aggregate_id.as_uuid())
            .fetch_one(&mut **tx)
            .await?;
    Ok(max.map(Version::new).unwrap_or(Version::initial()))
}

/// Event store persisted in PostgreSQL.
///
/// Streams live in the `events` table with a unique index on
/// `(aggregate_id, version)`. Concurrent writers to one stream are
/// serialized by that index, so a lost race surfaces as a conflict
/// error rather than a duplicate version.
#[derive(Clone)]
pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying connection pool, for callers that open their own
    /// transactions.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Applies pending schema migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    /// Writes a batch of events inside a caller-owned transaction.
    ///
    /// The outbox's append-and-stage path shares this with `append` so
    /// domain events and outbox messages commit together or not at all.
    pub async fn insert_events_in_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        events: &[EventEnvelope],
        options: &AppendOptions,
    ) -> Result<Version> {
        validate_events_for_append(events)?;

        let aggregate_id = events[0].aggregate_id;

        if let Some(expected) = options.expected_version {
            let actual = stream_version_in_tx(tx, aggregate_id).await?;
            if actual != expected {
                return Err(version_conflict(aggregate_id, expected, actual));
            }
        }

        let mut insert: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("INSERT INTO events ({EVENT_COLUMNS}) "));
        insert.push_values(events, |mut b, event| {
            b.push_bind(event.event_id.as_uuid())
                .push_bind(&event.event_type)
                .push_bind(event.aggregate_id.as_uuid())
                .push_bind(&event.aggregate_type)
                .push_bind(event.version.as_i64())
                .push_bind(event.timestamp)
                .push_bind(&event.payload)
                .push_bind(event.tenant_id.map(|t| t.as_uuid()))
                .push_bind(event.correlation_id.map(|c| c.as_uuid()))
                .push_bind(event.causation_id.map(|c| c.as_uuid()));
        });

        let last_version = events
            .last()
            .map(|e| e.version)
            .unwrap_or(Version::initial());

        insert.build().execute(&mut **tx).await.map_err(|e| {
            // The unique index rejects a version a concurrent writer took
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("unique_aggregate_version")
            {
                return version_conflict(
                    aggregate_id,
                    options.expected_version.unwrap_or(Version::initial()),
                    last_version,
                );
            }
            EventStoreError::Database(e)
        })?;

        Ok(last_version)
    }
}

#[async_trait]
impl EventStore for PostgresEventStore {
    #[tracing::instrument(skip(self, events), fields(count = events.len()))]
    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Version> {
        let count = events.len();
        let mut tx = self.pool.begin().await?;
        let last_version = Self::insert_events_in_tx(&mut tx, &events, &options).await?;
        tx.commit().await?;
        metrics::counter!("events_appended").increment(count as u64);
        Ok(last_version)
    }

    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        self.get_events_for_aggregate_from_version(aggregate_id, Version::initial())
            .await
    }

    async fn get_events_for_aggregate_from_version(
        &self,
        aggregate_id: AggregateId,
        from_version: Version,
    ) -> Result<Vec<EventEnvelope>> {
        let rows = sqlx::query(&format!(
            "SELECT {EVENT_COLUMNS} FROM events \
             WHERE aggregate_id = $1 AND version >= $2 \
             ORDER BY version ASC"
        ))
        .bind(aggregate_id.as_uuid())
        .bind(from_version.as_i64())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(decode_event_row).collect()
    }

    async fn query_events(&self, query: EventQuery) -> Result<Vec<EventEnvelope>> {
        let mut select: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {EVENT_COLUMNS} FROM events WHERE TRUE"));

        if let Some(id) = query.aggregate_id {
            select.push(" AND aggregate_id = ").push_bind(id.as_uuid());
        }
        if let Some(aggregate_type) = query.aggregate_type {
            select.push(" AND aggregate_type = ").push_bind(aggregate_type);
        }
        if let Some(tenant) = query.tenant_id {
            select.push(" AND tenant_id = ").push_bind(tenant.as_uuid());
        }
        if let Some(event_types) = query.event_types {
            select
                .push(" AND event_type = ANY(")
                .push_bind(event_types)
                .push(")");
        }
        if let Some(from) = query.from_version {
            select.push(" AND version >= ").push_bind(from.as_i64());
        }
        if let Some(to) = query.to_version {
            select.push(" AND version <= ").push_bind(to.as_i64());
        }
        if let Some(from) = query.from_timestamp {
            select.push(" AND timestamp >= ").push_bind(from);
        }
        if let Some(to) = query.to_timestamp {
            select.push(" AND timestamp <= ").push_bind(to);
        }

        select.push(" ORDER BY timestamp ASC, version ASC");

        if let Some(limit) = query.limit {
            select.push(" LIMIT ").push_bind(limit as i64);
        }
        if let Some(offset) = query.offset {
            select.push(" OFFSET ").push_bind(offset as i64);
        }

        let rows = select.build().fetch_all(&self.pool).await?;
        rows.into_iter().map(decode_event_row).collect()
    }

    async fn get_events_by_type(&self, event_type: &str) -> Result<Vec<EventEnvelope>> {
        let rows = sqlx::query(&format!(
            "SELECT {EVENT_COLUMNS} FROM events \
             WHERE event_type = $1 \
             ORDER BY timestamp ASC"
        ))
        .bind(event_type)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(decode_event_row).collect()
    }

    async fn stream_all_events(&self) -> Result<EventStream> {
        use futures_util::StreamExt;

        // The returned stream borrows its SQL, so this one stays a literal
        let stream = sqlx::query(
            "SELECT id, event_type, aggregate_id, aggregate_type, version, \
             timestamp, payload, tenant_id, correlation_id, causation_id \
             FROM events ORDER BY timestamp ASC, id ASC",
        )
        .fetch(&self.pool)
        .map(|result| match result {
            Ok(row) => decode_event_row(row),
            Err(e) => Err(EventStoreError::Database(e)),
        });

        Ok(Box::pin(stream))
    }

    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        let version: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM events WHERE aggregate_id = $1")
                .bind(aggregate_id.as_uuid())
                .fetch_one(&self.pool)
                .await?;

        Ok(version.map(Version::new))
    }

    async fn save_snapshot(&self, snapshot: Snapshot) -> Result<()> {
        sqlx::query(
            "INSERT INTO snapshots (aggregate_id, aggregate_type, version, timestamp, state) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (aggregate_id) DO UPDATE SET \
                 aggregate_type = EXCLUDED.aggregate_type, \
                 version = EXCLUDED.version, \
                 timestamp = EXCLUDED.timestamp, \
                 state = EXCLUDED.state",
        )
        .bind(snapshot.aggregate_id.as_uuid())
        .bind(&snapshot.aggregate_type)
        .bind(snapshot.version.as_i64())
        .bind(snapshot.timestamp)
        .bind(&snapshot.state)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_snapshot(&self, aggregate_id: AggregateId) -> Result<Option<Snapshot>> {
        let row: Option<PgRow> = sqlx::query(
            "SELECT aggregate_id, aggregate_type, version, timestamp, state \
             FROM snapshots WHERE aggregate_id = $1",
        )
        .bind(aggregate_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            Ok(Snapshot {
                aggregate_id: AggregateId::from_uuid(row.try_get::<Uuid, _>("aggregate_id")?),
                aggregate_type: row.try_get("aggregate_type")?,
                version: Version::new(row.try_get("version")?),
                timestamp: row.try_get::<DateTime<Utc>, _>("timestamp")?,
                state: row.try_get("state")?,
            })
        })
        .transpose()
    }
}
