//! End-to-end provisioning saga tests against in-memory stores.

use std::sync::Arc;
use std::time::Duration;

use common::{CorrelationId, TenantId};
use domain::{OrganizationService, OrganizationState};
use event_store::{EventStore, InMemoryEventStore};
use outbox::{InMemoryOutboxStore, OutboxStore};
use saga::{
    InMemoryDirectory, InMemorySagaStore, OrchestratorConfig, ProvisioningOrchestrator,
    SagaStatus, SagaStore, SagaTrigger, StartProvisioning,
};

type Orchestrator = ProvisioningOrchestrator<
    InMemoryEventStore,
    InMemoryOutboxStore,
    InMemorySagaStore,
    InMemoryDirectory,
>;

struct Harness {
    orchestrator: Orchestrator,
    outbox: Arc<InMemoryOutboxStore>,
    sagas: InMemorySagaStore,
    directory: InMemoryDirectory,
}

fn harness() -> Harness {
    harness_with_config(OrchestratorConfig::default())
}

fn harness_with_config(config: OrchestratorConfig) -> Harness {
    let outbox = Arc::new(InMemoryOutboxStore::new());
    let organizations = OrganizationService::new(outbox.event_store().clone(), outbox.clone());
    let sagas = InMemorySagaStore::new();
    let directory = InMemoryDirectory::new();

    let orchestrator =
        ProvisioningOrchestrator::new(organizations, sagas.clone(), directory.clone(), config);

    Harness {
        orchestrator,
        outbox,
        sagas,
        directory,
    }
}

fn organizations_for(
    outbox: &Arc<InMemoryOutboxStore>,
) -> OrganizationService<InMemoryEventStore, InMemoryOutboxStore> {
    OrganizationService::new(outbox.event_store().clone(), outbox.clone())
}

async fn staged_event_types(outbox: &InMemoryOutboxStore) -> Vec<String> {
    let pending = outbox.claim_pending(100).await.unwrap();
    pending.iter().map(|m| m.event_type.clone()).collect()
}

#[tokio::test]
async fn successful_provisioning_activates_organization() {
    let h = harness();

    let request = StartProvisioning::new(TenantId::new(), "Acme");
    let organization_id = request.organization_id;

    let saga = h.orchestrator.provision(request).await.unwrap();

    assert_eq!(saga.status, SagaStatus::Completed);
    let external_id = saga.external_id.clone().unwrap();

    let organization = organizations_for(&h.outbox)
        .get_organization(organization_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(organization.state(), OrganizationState::Active);
    assert_eq!(
        organization.external_id().map(|e| e.as_str().to_string()),
        Some(external_id)
    );

    // Activation announces the organization to downstream services
    assert_eq!(
        staged_event_types(&h.outbox).await,
        vec!["OrganizationCreated".to_string()]
    );
}

#[tokio::test]
async fn directory_failure_compensates_and_records_reason() {
    let h = harness();
    h.directory.set_fail_on_create(true);

    let request = StartProvisioning::new(TenantId::new(), "Acme");
    let organization_id = request.organization_id;
    let saga_id = request.saga_id;

    let saga = h.orchestrator.provision(request).await.unwrap();

    assert_eq!(saga.status, SagaStatus::Failed);
    assert!(saga.failure_reason.is_some());
    assert!(saga.external_id.is_none());

    // The local aggregate survives as a tombstone
    let organization = organizations_for(&h.outbox)
        .get_organization(organization_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(organization.state(), OrganizationState::Removed);

    // No OrganizationCreated ever reaches downstream services
    let types = staged_event_types(&h.outbox).await;
    assert_eq!(types, vec!["OrganizationDeleted".to_string()]);

    // The failed instance stays queryable for auditing
    let stored = h.sagas.get(saga_id).await.unwrap().unwrap();
    assert_eq!(stored.status, SagaStatus::Failed);
}

#[tokio::test]
async fn slow_directory_call_times_out_and_compensates() {
    let h = harness_with_config(OrchestratorConfig {
        directory_timeout: Duration::from_millis(20),
    });
    h.directory.set_delay(Some(Duration::from_millis(500)));

    let request = StartProvisioning::new(TenantId::new(), "Acme");
    let organization_id = request.organization_id;

    let saga = h.orchestrator.provision(request).await.unwrap();

    assert_eq!(saga.status, SagaStatus::Failed);
    assert_eq!(
        saga.failure_reason.as_deref(),
        Some("external directory call timed out")
    );

    let organization = organizations_for(&h.outbox)
        .get_organization(organization_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(organization.state(), OrganizationState::Removed);
}

#[tokio::test]
async fn duplicate_provision_request_runs_once() {
    let h = harness();

    let request = StartProvisioning::new(TenantId::new(), "Acme");
    let first = h.orchestrator.provision(request.clone()).await.unwrap();
    let second = h.orchestrator.provision(request).await.unwrap();

    assert_eq!(first.status, SagaStatus::Completed);
    assert_eq!(second.external_id, first.external_id);
    assert_eq!(h.directory.created_count(), 1);
    assert_eq!(h.sagas.len().await, 1);

    // The duplicate stages no additional integration events
    assert_eq!(staged_event_types(&h.outbox).await.len(), 1);
}

#[tokio::test]
async fn stale_trigger_leaves_terminal_saga_untouched() {
    let h = harness();

    let request = StartProvisioning::new(TenantId::new(), "Acme");
    let saga_id = request.saga_id;
    let completed = h.orchestrator.provision(request).await.unwrap();

    let after = h
        .orchestrator
        .handle_trigger(
            saga_id,
            SagaTrigger::ExternalCreateFailed {
                reason: "late broker redelivery".to_string(),
            },
        )
        .await
        .unwrap();

    assert_eq!(after.status, SagaStatus::Completed);
    assert_eq!(after.external_id, completed.external_id);
    assert!(after.failure_reason.is_none());
}

#[tokio::test]
async fn unknown_saga_trigger_is_rejected() {
    let h = harness();

    let result = h
        .orchestrator
        .handle_trigger(CorrelationId::new(), SagaTrigger::CompensationCompleted)
        .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn instances_remain_listable_after_settling() {
    let h = harness();
    h.directory.set_fail_on_create(true);
    h.orchestrator
        .provision(StartProvisioning::new(TenantId::new(), "Doomed"))
        .await
        .unwrap();

    h.directory.set_fail_on_create(false);
    h.orchestrator
        .provision(StartProvisioning::new(TenantId::new(), "Acme"))
        .await
        .unwrap();

    let failed = h.sagas.list_by_status(SagaStatus::Failed).await.unwrap();
    let completed = h.sagas.list_by_status(SagaStatus::Completed).await.unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(completed.len(), 1);
    assert_eq!(failed[0].name, "Doomed");
}

#[tokio::test]
async fn saga_correlation_flows_through_domain_events() {
    let h = harness();

    let request = StartProvisioning::new(TenantId::new(), "Acme");
    let organization_id = request.organization_id;
    let saga_id = request.saga_id;
    h.orchestrator.provision(request).await.unwrap();

    let events = h
        .outbox
        .event_store()
        .get_events_for_aggregate(organization_id)
        .await
        .unwrap();

    assert!(!events.is_empty());
    for event in events {
        assert_eq!(event.correlation_id, Some(saga_id));
    }
}
