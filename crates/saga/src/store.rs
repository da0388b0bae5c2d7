//! Saga instance persistence.
//!
//! Instances are upserted after every transition and never deleted;
//! terminal instances remain readable as an audit trail.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::CorrelationId;
use sqlx::{PgPool, Row};
use tokio::sync::RwLock;

use crate::Result;
use crate::instance::ProvisioningSaga;
use crate::state::SagaStatus;

/// Storage for saga instances.
#[async_trait]
pub trait SagaStore: Send + Sync {
    /// Inserts or updates a saga instance.
    async fn save(&self, saga: &ProvisioningSaga) -> Result<()>;

    /// Returns a saga instance by ID, terminal or not.
    async fn get(&self, id: CorrelationId) -> Result<Option<ProvisioningSaga>>;

    /// Returns all instances with the given status.
    async fn list_by_status(&self, status: SagaStatus) -> Result<Vec<ProvisioningSaga>>;
}

/// In-memory saga store for testing.
#[derive(Clone, Default)]
pub struct InMemorySagaStore {
    instances: Arc<RwLock<HashMap<CorrelationId, ProvisioningSaga>>>,
}

impl InMemorySagaStore {
    /// Creates a new empty in-memory saga store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored instances.
    pub async fn len(&self) -> usize {
        self.instances.read().await.len()
    }

    /// Returns true if the store holds no instances.
    pub async fn is_empty(&self) -> bool {
        self.instances.read().await.is_empty()
    }
}

#[async_trait]
impl SagaStore for InMemorySagaStore {
    async fn save(&self, saga: &ProvisioningSaga) -> Result<()> {
        self.instances.write().await.insert(saga.id, saga.clone());
        Ok(())
    }

    async fn get(&self, id: CorrelationId) -> Result<Option<ProvisioningSaga>> {
        Ok(self.instances.read().await.get(&id).cloned())
    }

    async fn list_by_status(&self, status: SagaStatus) -> Result<Vec<ProvisioningSaga>> {
        Ok(self
            .instances
            .read()
            .await
            .values()
            .filter(|s| s.status == status)
            .cloned()
            .collect())
    }
}

/// PostgreSQL-backed saga store.
///
/// Each instance lives in one row of `saga_instances` with its full
/// state serialized to JSONB; status is also stored as a column for
/// filtering.
#[derive(Clone)]
pub struct PostgresSagaStore {
    pool: PgPool,
}

impl PostgresSagaStore {
    /// Creates a new store using the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_saga(row: &sqlx::postgres::PgRow) -> Result<ProvisioningSaga> {
    let state: serde_json::Value = row.get("state");
    Ok(serde_json::from_value(state)?)
}

#[async_trait]
impl SagaStore for PostgresSagaStore {
    async fn save(&self, saga: &ProvisioningSaga) -> Result<()> {
        let state = serde_json::to_value(saga)?;
        let now: DateTime<Utc> = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO saga_instances (id, saga_type, status, state, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status,
                state = EXCLUDED.state,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(saga.id.as_uuid())
        .bind(saga.saga_type())
        .bind(saga.status.as_str())
        .bind(state)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: CorrelationId) -> Result<Option<ProvisioningSaga>> {
        let row = sqlx::query("SELECT state FROM saga_instances WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_saga).transpose()
    }

    async fn list_by_status(&self, status: SagaStatus) -> Result<Vec<ProvisioningSaga>> {
        let rows = sqlx::query(
            "SELECT state FROM saga_instances WHERE status = $1 ORDER BY created_at ASC",
        )
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_saga).collect()
    }
}
