use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::CorrelationId;
use event_store::{AppendOptions, EventEnvelope, PostgresEventStore, Version};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    MessageId, OutboxError, OutboxMessage, OutboxStatus, Result,
    store::{OutboxStore, TransactionalAppend},
};

/// Lease granted per claimed row. Long enough for a publish cycle,
/// short enough that a crashed publisher does not stall redelivery.
const DEFAULT_CLAIM_LEASE: Duration = Duration::from_secs(30);

/// PostgreSQL-backed outbox store.
///
/// Shares a pool with the event store so `append_and_stage` can put
/// domain events and outbox rows in one transaction. A claim writes a
/// `claimed_until` lease in the same statement that selects the rows
/// with `FOR UPDATE SKIP LOCKED`, so the claim survives the statement
/// and concurrent publishers drain disjoint batches. Settling a row
/// (publish, release, fail) clears the lease; an unexpired lease on a
/// crashed publisher simply runs out.
#[derive(Clone)]
pub struct PostgresOutboxStore {
    pool: PgPool,
    claim_lease: Duration,
}

impl PostgresOutboxStore {
    /// Creates a new PostgreSQL outbox store.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            claim_lease: DEFAULT_CLAIM_LEASE,
        }
    }

    /// Overrides how long a claim stays exclusive.
    pub fn with_claim_lease(mut self, lease: Duration) -> Self {
        self.claim_lease = lease;
        self
    }

    fn row_to_message(row: PgRow) -> Result<OutboxMessage> {
        let status_str: String = row.try_get("status")?;
        let status = OutboxStatus::parse(&status_str)
            .ok_or_else(|| OutboxError::Publish(format!("unknown outbox status: {status_str}")))?;

        Ok(OutboxMessage {
            id: MessageId::from_uuid(row.try_get::<Uuid, _>("id")?),
            topic: row.try_get("topic")?,
            event_type: row.try_get("event_type")?,
            payload: row.try_get("payload")?,
            status,
            occurred_at: row.try_get::<DateTime<Utc>, _>("occurred_at")?,
            published_at: row.try_get::<Option<DateTime<Utc>>, _>("published_at")?,
            retry_count: row.try_get::<i32, _>("retry_count")? as u32,
            last_error: row.try_get("last_error")?,
            correlation_id: row
                .try_get::<Option<Uuid>, _>("correlation_id")?
                .map(CorrelationId::from_uuid),
        })
    }

    async fn insert_messages_in_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        messages: &[OutboxMessage],
    ) -> Result<()> {
        for msg in messages {
            sqlx::query(
                r#"
                INSERT INTO outbox_messages (id, topic, event_type, payload, status, occurred_at, published_at, retry_count, last_error, correlation_id)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                "#,
            )
            .bind(msg.id.as_uuid())
            .bind(&msg.topic)
            .bind(&msg.event_type)
            .bind(&msg.payload)
            .bind(msg.status.as_str())
            .bind(msg.occurred_at)
            .bind(msg.published_at)
            .bind(msg.retry_count as i32)
            .bind(&msg.last_error)
            .bind(msg.correlation_id.map(|c| c.as_uuid()))
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl OutboxStore for PostgresOutboxStore {
    async fn stage(&self, messages: Vec<OutboxMessage>) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        Self::insert_messages_in_tx(&mut tx, &messages).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn claim_pending(&self, limit: usize) -> Result<Vec<OutboxMessage>> {
        // The lease must be written by the same statement that selects
        // the rows. A bare SELECT ... FOR UPDATE on the pool drops its
        // row locks at statement end, and two publishers would then
        // claim the same batch.
        let lease_until = Utc::now() + self.claim_lease;
        let rows = sqlx::query(
            r#"
            UPDATE outbox_messages
            SET claimed_until = $2
            WHERE id IN (
                SELECT id
                FROM outbox_messages
                WHERE status = 'pending'
                  AND (claimed_until IS NULL OR claimed_until < NOW())
                ORDER BY occurred_at ASC
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING id, topic, event_type, payload, status, occurred_at, published_at, retry_count, last_error, correlation_id
            "#,
        )
        .bind(limit as i64)
        .bind(lease_until)
        .fetch_all(&self.pool)
        .await?;

        let mut batch: Vec<OutboxMessage> = rows
            .into_iter()
            .map(Self::row_to_message)
            .collect::<Result<_>>()?;
        // RETURNING does not preserve the subquery ordering
        batch.sort_by_key(|m| m.occurred_at);
        Ok(batch)
    }

    async fn mark_published(&self, id: MessageId) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE outbox_messages
            SET status = 'published', published_at = NOW(), claimed_until = NULL
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(OutboxError::MessageNotFound(id));
        }
        Ok(())
    }

    async fn release(&self, id: MessageId, error: &str) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE outbox_messages
            SET retry_count = retry_count + 1, last_error = $2, claimed_until = NULL
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(error)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(OutboxError::MessageNotFound(id));
        }
        Ok(())
    }

    async fn mark_failed(&self, id: MessageId, error: &str) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE outbox_messages
            SET status = 'failed', last_error = $2, claimed_until = NULL
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(error)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(OutboxError::MessageNotFound(id));
        }
        Ok(())
    }

    async fn dead_letters(&self) -> Result<Vec<OutboxMessage>> {
        let rows = sqlx::query(
            r#"
            SELECT id, topic, event_type, payload, status, occurred_at, published_at, retry_count, last_error, correlation_id
            FROM outbox_messages
            WHERE status = 'failed'
            ORDER BY occurred_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_message).collect()
    }

    async fn pending_count(&self) -> Result<usize> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM outbox_messages WHERE status = 'pending'")
                .fetch_one(&self.pool)
                .await?;
        Ok(count as usize)
    }
}

#[async_trait]
impl TransactionalAppend for PostgresOutboxStore {
    async fn append_and_stage(
        &self,
        events: Vec<EventEnvelope>,
        options: AppendOptions,
        messages: Vec<OutboxMessage>,
    ) -> Result<Version> {
        let mut tx = self.pool.begin().await?;
        let version = PostgresEventStore::insert_events_in_tx(&mut tx, &events, &options).await?;
        Self::insert_messages_in_tx(&mut tx, &messages).await?;
        tx.commit().await?;
        Ok(version)
    }
}
