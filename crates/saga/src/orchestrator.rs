//! Saga orchestrator for organization provisioning.

use common::{AggregateId, CorrelationId, TenantId};
use event_store::EventStore;
use outbox::TransactionalAppend;
use tokio::time::timeout;

use crate::config::OrchestratorConfig;
use crate::error::SagaError;
use crate::instance::ProvisioningSaga;
use crate::services::ExternalDirectory;
use crate::state::SagaStatus;
use crate::store::SagaStore;
use crate::transition::{SagaAction, SagaTrigger, transition};

/// Request to provision a new organization.
#[derive(Debug, Clone)]
pub struct StartProvisioning {
    /// Saga ID, used as correlation ID for everything the saga does.
    pub saga_id: CorrelationId,

    /// The organization to create.
    pub organization_id: AggregateId,

    /// The requesting tenant.
    pub tenant_id: TenantId,

    /// Requested organization name.
    pub name: String,
}

impl StartProvisioning {
    /// Creates a request with generated saga and organization IDs.
    pub fn new(tenant_id: TenantId, name: impl Into<String>) -> Self {
        Self {
            saga_id: CorrelationId::new(),
            organization_id: AggregateId::new(),
            tenant_id,
            name: name.into(),
        }
    }
}

/// Drives provisioning sagas end to end.
///
/// The orchestrator owns no state machine logic of its own; it feeds
/// triggers through [`transition`], persists each resulting instance,
/// and executes the returned actions. Some actions yield a follow-up
/// trigger (the directory call, compensation), which is fed back in
/// until the saga settles.
pub struct ProvisioningOrchestrator<S, T, St, D>
where
    S: EventStore,
    T: TransactionalAppend,
    St: SagaStore,
    D: ExternalDirectory,
{
    organizations: domain::OrganizationService<S, T>,
    saga_store: St,
    directory: D,
    config: OrchestratorConfig,
}

impl<S, T, St, D> ProvisioningOrchestrator<S, T, St, D>
where
    S: EventStore,
    T: TransactionalAppend,
    St: SagaStore,
    D: ExternalDirectory,
{
    /// Creates a new orchestrator.
    pub fn new(
        organizations: domain::OrganizationService<S, T>,
        saga_store: St,
        directory: D,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            organizations,
            saga_store,
            directory,
            config,
        }
    }

    /// Runs a provisioning saga to a settled state.
    ///
    /// Redelivering a request with the same saga ID is harmless; the
    /// existing instance absorbs the duplicate Start trigger.
    #[tracing::instrument(skip(self), fields(saga_id = %request.saga_id))]
    pub async fn provision(
        &self,
        request: StartProvisioning,
    ) -> Result<ProvisioningSaga, SagaError> {
        metrics::counter!("saga_executions_total").increment(1);
        let saga_start = std::time::Instant::now();

        let saga = match self.saga_store.get(request.saga_id).await? {
            Some(existing) => existing,
            None => {
                let saga = ProvisioningSaga::new(
                    request.saga_id,
                    request.organization_id,
                    request.tenant_id,
                    request.name,
                );
                self.saga_store.save(&saga).await?;
                saga
            }
        };

        let saga = self.drive(saga, SagaTrigger::Start).await?;

        metrics::histogram!("saga_duration_seconds").record(saga_start.elapsed().as_secs_f64());
        Ok(saga)
    }

    /// Applies a single trigger to an existing saga.
    ///
    /// Used for redelivered broker messages and operator replays.
    #[tracing::instrument(skip(self))]
    pub async fn handle_trigger(
        &self,
        saga_id: CorrelationId,
        trigger: SagaTrigger,
    ) -> Result<ProvisioningSaga, SagaError> {
        let saga = self
            .saga_store
            .get(saga_id)
            .await?
            .ok_or(SagaError::SagaNotFound(saga_id))?;

        self.drive(saga, trigger).await
    }

    /// Returns a saga instance by ID.
    pub async fn get_saga(
        &self,
        saga_id: CorrelationId,
    ) -> Result<Option<ProvisioningSaga>, SagaError> {
        self.saga_store.get(saga_id).await
    }

    /// Feeds triggers through the state machine until none remain.
    async fn drive(
        &self,
        mut saga: ProvisioningSaga,
        trigger: SagaTrigger,
    ) -> Result<ProvisioningSaga, SagaError> {
        let mut next = Some(trigger);

        while let Some(trigger) = next.take() {
            let before = saga.status;
            let (updated, actions) = transition(saga, trigger);
            saga = updated;
            self.saga_store.save(&saga).await?;

            if saga.status != before {
                match saga.status {
                    SagaStatus::Completed => {
                        metrics::counter!("saga_completed").increment(1);
                        tracing::info!(saga_id = %saga.id, "saga completed");
                    }
                    SagaStatus::Failed => {
                        metrics::counter!("saga_failed").increment(1);
                        tracing::warn!(
                            saga_id = %saga.id,
                            reason = saga.failure_reason.as_deref().unwrap_or("unknown"),
                            "saga failed"
                        );
                    }
                    _ => {}
                }
            }

            for action in actions {
                if let Some(follow_up) = self.execute(&saga, action).await? {
                    next = Some(follow_up);
                }
            }
        }

        Ok(saga)
    }

    /// Executes one action, returning a follow-up trigger if the
    /// action produced one.
    async fn execute(
        &self,
        saga: &ProvisioningSaga,
        action: SagaAction,
    ) -> Result<Option<SagaTrigger>, SagaError> {
        match action {
            SagaAction::CreateOrganization => {
                self.organizations
                    .create_organization(
                        domain::CreateOrganization::new(
                            saga.organization_id,
                            saga.tenant_id,
                            saga.name.as_str(),
                        )
                        .with_correlation(saga.id),
                    )
                    .await?;
                Ok(None)
            }

            SagaAction::CallExternalDirectory => {
                let call = self.directory.create_organization(saga.id, &saga.name);
                match timeout(self.config.directory_timeout, call).await {
                    Ok(Ok(external_id)) => {
                        Ok(Some(SagaTrigger::ExternalCreateSucceeded { external_id }))
                    }
                    Ok(Err(e)) => {
                        tracing::warn!(saga_id = %saga.id, error = %e, "external directory call failed");
                        Ok(Some(SagaTrigger::ExternalCreateFailed {
                            reason: e.to_string(),
                        }))
                    }
                    Err(_) => {
                        tracing::warn!(saga_id = %saga.id, "external directory call timed out");
                        Ok(Some(SagaTrigger::ExternalCreateFailed {
                            reason: "external directory call timed out".to_string(),
                        }))
                    }
                }
            }

            SagaAction::ActivateOrganization { external_id } => {
                self.organizations
                    .activate_organization(
                        domain::ActivateOrganization::new(saga.organization_id, external_id)
                            .with_correlation(saga.id),
                    )
                    .await?;
                // Completion is recorded only after the activate write
                // is durable
                Ok(Some(SagaTrigger::ActivationSucceeded))
            }

            SagaAction::RemoveOrganization { reason } => {
                self.organizations
                    .remove_organization(
                        domain::RemoveOrganization::new(saga.organization_id, reason)
                            .with_correlation(saga.id),
                    )
                    .await?;
                Ok(Some(SagaTrigger::CompensationCompleted))
            }
        }
    }
}
