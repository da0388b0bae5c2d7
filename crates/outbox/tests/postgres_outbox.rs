//! PostgreSQL outbox integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p outbox --test postgres_outbox
//! ```

use std::sync::Arc;
use std::time::Duration;

use common::{
    AggregateId, CorrelationId, IntegrationEnvelope, ORGANIZATIONS_TOPIC,
    OrganizationIntegrationEvent, TenantId,
};
use event_store::{AppendOptions, EventEnvelope, EventStore, PostgresEventStore, Version};
use outbox::{
    OutboxMessage, OutboxStatus, OutboxStore, PostgresOutboxStore, TransactionalAppend,
};
use serial_test::serial;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();

            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_events_table.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();
            sqlx::raw_sql(include_str!(
                "../../../migrations/002_create_outbox_table.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();

            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

async fn get_test_pool() -> PgPool {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE events, snapshots, outbox_messages")
        .execute(&pool)
        .await
        .unwrap();

    pool
}

fn created_message() -> OutboxMessage {
    let event = OrganizationIntegrationEvent::organization_created(
        AggregateId::new(),
        TenantId::new(),
        "Acme",
        "ext-123",
    );
    let envelope = IntegrationEnvelope::wrap(
        event.event_type(),
        &event,
        chrono::Utc::now(),
        CorrelationId::new(),
    )
    .unwrap();
    OutboxMessage::new(ORGANIZATIONS_TOPIC, &envelope).unwrap()
}

fn domain_event(aggregate_id: AggregateId, version: i64) -> EventEnvelope {
    EventEnvelope::builder()
        .aggregate_id(aggregate_id)
        .aggregate_type("Organization")
        .event_type("OrganizationActivated")
        .version(Version::new(version))
        .payload_raw(serde_json::json!({"external_id": "ext-123"}))
        .build()
}

#[tokio::test]
#[serial]
async fn stage_claim_publish_roundtrip() {
    let pool = get_test_pool().await;
    let store = PostgresOutboxStore::new(pool);

    let msg = created_message();
    let id = msg.id;
    store.stage(vec![msg]).await.unwrap();
    assert_eq!(store.pending_count().await.unwrap(), 1);

    let claimed = store.claim_pending(10).await.unwrap();
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].id, id);
    assert_eq!(claimed[0].status, OutboxStatus::Pending);
    assert_eq!(claimed[0].event_type, "OrganizationCreated");

    store.mark_published(id).await.unwrap();
    assert_eq!(store.pending_count().await.unwrap(), 0);

    // Published messages never come back
    let claimed = store.claim_pending(10).await.unwrap();
    assert!(claimed.is_empty());
}

#[tokio::test]
#[serial]
async fn release_increments_retry_count() {
    let pool = get_test_pool().await;
    let store = PostgresOutboxStore::new(pool);

    let msg = created_message();
    let id = msg.id;
    store.stage(vec![msg]).await.unwrap();

    store.release(id, "broker unavailable").await.unwrap();
    store.release(id, "still unavailable").await.unwrap();

    let claimed = store.claim_pending(10).await.unwrap();
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].retry_count, 2);
    assert_eq!(claimed[0].last_error.as_deref(), Some("still unavailable"));
}

#[tokio::test]
#[serial]
async fn mark_failed_moves_message_to_dead_letters() {
    let pool = get_test_pool().await;
    let store = PostgresOutboxStore::new(pool);

    let msg = created_message();
    let id = msg.id;
    store.stage(vec![msg]).await.unwrap();

    store.mark_failed(id, "retries exhausted").await.unwrap();

    assert_eq!(store.pending_count().await.unwrap(), 0);
    let dead = store.dead_letters().await.unwrap();
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].id, id);
    assert_eq!(dead[0].last_error.as_deref(), Some("retries exhausted"));
}

#[tokio::test]
#[serial]
async fn append_and_stage_commits_events_and_messages_together() {
    let pool = get_test_pool().await;
    let outbox_store = PostgresOutboxStore::new(pool.clone());
    let event_store = PostgresEventStore::new(pool);
    let aggregate_id = AggregateId::new();

    let version = outbox_store
        .append_and_stage(
            vec![domain_event(aggregate_id, 1)],
            AppendOptions::expect_new(),
            vec![created_message()],
        )
        .await
        .unwrap();

    assert_eq!(version, Version::first());

    let events = event_store
        .get_events_for_aggregate(aggregate_id)
        .await
        .unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(outbox_store.pending_count().await.unwrap(), 1);
}

#[tokio::test]
#[serial]
async fn append_and_stage_rolls_back_on_version_conflict() {
    let pool = get_test_pool().await;
    let outbox_store = PostgresOutboxStore::new(pool.clone());
    let event_store = PostgresEventStore::new(pool);
    let aggregate_id = AggregateId::new();

    outbox_store
        .append_and_stage(
            vec![domain_event(aggregate_id, 1)],
            AppendOptions::expect_new(),
            vec![created_message()],
        )
        .await
        .unwrap();

    // Stale writer: nothing from this call may become visible
    let result = outbox_store
        .append_and_stage(
            vec![domain_event(aggregate_id, 1)],
            AppendOptions::expect_new(),
            vec![created_message()],
        )
        .await;

    assert!(result.is_err());

    let events = event_store
        .get_events_for_aggregate(aggregate_id)
        .await
        .unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(outbox_store.pending_count().await.unwrap(), 1);
}

#[tokio::test]
#[serial]
async fn claims_are_exclusive_across_publishers() {
    let pool = get_test_pool().await;
    let first = PostgresOutboxStore::new(pool.clone());
    let second = PostgresOutboxStore::new(pool);

    first
        .stage(vec![created_message(), created_message(), created_message()])
        .await
        .unwrap();

    let batch = first.claim_pending(10).await.unwrap();
    assert_eq!(batch.len(), 3);

    // The claim outlives its statement, so a second publisher sees an
    // empty pool rather than the same batch
    let other = second.claim_pending(10).await.unwrap();
    assert!(other.is_empty());
    assert_eq!(second.pending_count().await.unwrap(), 3);
}

#[tokio::test]
#[serial]
async fn released_message_is_claimable_by_another_publisher() {
    let pool = get_test_pool().await;
    let first = PostgresOutboxStore::new(pool.clone());
    let second = PostgresOutboxStore::new(pool);

    let msg = created_message();
    let id = msg.id;
    first.stage(vec![msg]).await.unwrap();

    let batch = first.claim_pending(10).await.unwrap();
    assert_eq!(batch.len(), 1);
    assert!(second.claim_pending(10).await.unwrap().is_empty());

    first.release(id, "broker unavailable").await.unwrap();

    let batch = second.claim_pending(10).await.unwrap();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].id, id);
    assert_eq!(batch[0].retry_count, 1);
}

#[tokio::test]
#[serial]
async fn expired_lease_frees_message_for_reclaim() {
    let pool = get_test_pool().await;
    let store = PostgresOutboxStore::new(pool).with_claim_lease(Duration::from_millis(1));

    store.stage(vec![created_message()]).await.unwrap();
    assert_eq!(store.claim_pending(10).await.unwrap().len(), 1);

    // A publisher that dies never settles its rows; the lease runs out
    // and another claim picks them up
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(store.claim_pending(10).await.unwrap().len(), 1);
}

#[tokio::test]
#[serial]
async fn claim_orders_by_occurred_at() {
    let pool = get_test_pool().await;
    let store = PostgresOutboxStore::new(pool);

    let mut older = created_message();
    older.occurred_at = chrono::Utc::now() - chrono::Duration::seconds(30);
    let older_id = older.id;
    let newer = created_message();

    store.stage(vec![newer, older]).await.unwrap();

    let claimed = store.claim_pending(1).await.unwrap();
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].id, older_id);
}
