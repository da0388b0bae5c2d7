//! Organization service providing a simplified API for organization operations.
//!
//! Commands that change what other services see stage the matching
//! integration event through the outbox in the same commit as the
//! domain events.

use std::sync::Arc;

use chrono::Utc;
use common::{
    AggregateId, CorrelationId, IntegrationEnvelope, ORGANIZATIONS_TOPIC,
    OrganizationIntegrationEvent,
};
use event_store::EventStore;
use outbox::{OutboxMessage, TransactionalAppend};

use crate::command::{CommandHandler, CommandResult, EventContext};
use crate::error::DomainError;

use super::{
    ActivateOrganization, CreateOrganization, Organization, OrganizationError, RemoveOrganization,
    RenameOrganization,
};

impl From<OrganizationError> for DomainError {
    fn from(e: OrganizationError) -> Self {
        DomainError::Organization(e)
    }
}

/// Service for managing organizations.
///
/// Wraps the command handler and an outbox so that domain events and
/// their integration counterparts commit together.
pub struct OrganizationService<S: EventStore, T: TransactionalAppend> {
    handler: CommandHandler<S, Organization>,
    outbox: Arc<T>,
}

impl<S: EventStore, T: TransactionalAppend> OrganizationService<S, T> {
    /// Creates a new organization service.
    pub fn new(store: S, outbox: Arc<T>) -> Self {
        Self {
            handler: CommandHandler::new(store),
            outbox,
        }
    }

    /// Returns a reference to the underlying command handler.
    pub fn handler(&self) -> &CommandHandler<S, Organization> {
        &self.handler
    }

    /// Creates a new organization in the Provisioning state.
    ///
    /// No integration event is staged here; other services only learn
    /// about the organization once provisioning completes and
    /// activation stages `OrganizationCreated`.
    #[tracing::instrument(skip(self))]
    pub async fn create_organization(
        &self,
        cmd: CreateOrganization,
    ) -> Result<CommandResult<Organization>, DomainError> {
        let organization_id = cmd.organization_id;
        let tenant_id = cmd.tenant_id;
        let name = cmd.name.clone();
        let ctx = EventContext::for_tenant(tenant_id)
            .correlation(correlation_for(organization_id, cmd.correlation_id));

        self.handler
            .execute(organization_id, ctx, |organization| {
                organization.initiate(organization_id, tenant_id, name)
            })
            .await
    }

    /// Activates an organization and stages `OrganizationCreated`.
    #[tracing::instrument(skip(self))]
    pub async fn activate_organization(
        &self,
        cmd: ActivateOrganization,
    ) -> Result<CommandResult<Organization>, DomainError> {
        let organization_id = cmd.organization_id;
        let external_id = cmd.external_id.clone();
        let correlation_id = correlation_for(organization_id, cmd.correlation_id);
        let ctx = self.context_for(organization_id, correlation_id).await?;

        self.handler
            .execute_with_outbox(
                self.outbox.as_ref(),
                organization_id,
                ctx,
                |organization| organization.activate(external_id),
                |organization, _events| {
                    let tenant_id = organization
                        .tenant_id()
                        .ok_or(OrganizationError::NotFound)?;
                    let name = organization.name().ok_or(OrganizationError::NotFound)?;
                    let external_id = organization
                        .external_id()
                        .ok_or(OrganizationError::NotFound)?;
                    let event = OrganizationIntegrationEvent::organization_created(
                        organization_id,
                        tenant_id,
                        name.as_str(),
                        external_id.as_str(),
                    );
                    stage(event, correlation_id)
                },
            )
            .await
    }

    /// Renames an organization and stages `OrganizationUpdated`.
    ///
    /// Renaming to the current name emits nothing and stages nothing.
    #[tracing::instrument(skip(self))]
    pub async fn rename_organization(
        &self,
        cmd: RenameOrganization,
    ) -> Result<CommandResult<Organization>, DomainError> {
        let organization_id = cmd.organization_id;
        let new_name = cmd.new_name.clone();
        let correlation_id = correlation_for(organization_id, cmd.correlation_id);
        let ctx = self.context_for(organization_id, correlation_id).await?;

        self.handler
            .execute_with_outbox(
                self.outbox.as_ref(),
                organization_id,
                ctx,
                |organization| organization.rename(new_name),
                |organization, _events| {
                    let name = organization.name().ok_or(OrganizationError::NotFound)?;
                    let event = OrganizationIntegrationEvent::organization_updated(
                        organization_id,
                        name.as_str(),
                    );
                    stage(event, correlation_id)
                },
            )
            .await
    }

    /// Removes an organization and stages `OrganizationDeleted`.
    ///
    /// Removing an already removed organization is a no-op.
    #[tracing::instrument(skip(self))]
    pub async fn remove_organization(
        &self,
        cmd: RemoveOrganization,
    ) -> Result<CommandResult<Organization>, DomainError> {
        let organization_id = cmd.organization_id;
        let reason = cmd.reason.clone();
        let correlation_id = correlation_for(organization_id, cmd.correlation_id);
        let ctx = self.context_for(organization_id, correlation_id).await?;

        self.handler
            .execute_with_outbox(
                self.outbox.as_ref(),
                organization_id,
                ctx,
                |organization| organization.remove(reason),
                |_, _events| {
                    let event =
                        OrganizationIntegrationEvent::organization_deleted(organization_id);
                    stage(event, correlation_id)
                },
            )
            .await
    }

    /// Loads an organization by ID.
    ///
    /// Returns None if the organization doesn't exist.
    #[tracing::instrument(skip(self))]
    pub async fn get_organization(
        &self,
        organization_id: AggregateId,
    ) -> Result<Option<Organization>, DomainError> {
        self.handler.load_existing(organization_id).await
    }

    async fn context_for(
        &self,
        organization_id: AggregateId,
        correlation_id: CorrelationId,
    ) -> Result<EventContext, DomainError> {
        let organization = self.handler.load(organization_id).await?;
        let mut ctx = EventContext::new().correlation(correlation_id);
        if let Some(tenant_id) = organization.tenant_id() {
            ctx = EventContext::for_tenant(tenant_id).correlation(correlation_id);
        }
        Ok(ctx)
    }
}

fn correlation_for(
    organization_id: AggregateId,
    explicit: Option<CorrelationId>,
) -> CorrelationId {
    explicit.unwrap_or_else(|| CorrelationId::from(organization_id))
}

fn stage(
    event: OrganizationIntegrationEvent,
    correlation_id: CorrelationId,
) -> Result<Vec<OutboxMessage>, DomainError> {
    let envelope = IntegrationEnvelope::wrap(event.event_type(), &event, Utc::now(), correlation_id)?;
    Ok(vec![OutboxMessage::new(ORGANIZATIONS_TOPIC, &envelope)?])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::Aggregate;
    use crate::organization::OrganizationState;
    use common::TenantId;
    use outbox::{InMemoryOutboxStore, OutboxStatus, OutboxStore};

    fn service() -> (
        OrganizationService<event_store::InMemoryEventStore, InMemoryOutboxStore>,
        Arc<InMemoryOutboxStore>,
    ) {
        let outbox = Arc::new(InMemoryOutboxStore::new());
        let service = OrganizationService::new(outbox.event_store().clone(), outbox.clone());
        (service, outbox)
    }

    async fn create_and_activate(
        service: &OrganizationService<event_store::InMemoryEventStore, InMemoryOutboxStore>,
    ) -> AggregateId {
        let cmd = CreateOrganization::for_tenant(TenantId::new(), "Acme");
        let organization_id = cmd.organization_id;
        service.create_organization(cmd).await.unwrap();
        service
            .activate_organization(ActivateOrganization::new(organization_id, "ext-123"))
            .await
            .unwrap();
        organization_id
    }

    #[tokio::test]
    async fn create_organization_stages_nothing() {
        let (service, outbox) = service();

        let cmd = CreateOrganization::for_tenant(TenantId::new(), "Acme");
        let organization_id = cmd.organization_id;
        let result = service.create_organization(cmd).await.unwrap();

        assert_eq!(result.aggregate.id(), Some(organization_id));
        assert_eq!(result.aggregate.state(), OrganizationState::Provisioning);
        assert_eq!(outbox.pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn create_with_blank_name_fails() {
        let (service, _) = service();

        let result = service
            .create_organization(CreateOrganization::for_tenant(TenantId::new(), "  "))
            .await;

        assert!(matches!(
            result,
            Err(DomainError::Organization(OrganizationError::NameRequired))
        ));
    }

    #[tokio::test]
    async fn activate_stages_organization_created() {
        let (service, outbox) = service();
        let organization_id = create_and_activate(&service).await;

        let organization = service
            .get_organization(organization_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(organization.state(), OrganizationState::Active);

        let pending = outbox.messages_with_status(OutboxStatus::Pending).await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].event_type, "OrganizationCreated");
        assert_eq!(pending[0].topic, ORGANIZATIONS_TOPIC);
    }

    #[tokio::test]
    async fn rename_stages_organization_updated() {
        let (service, outbox) = service();
        let organization_id = create_and_activate(&service).await;

        let result = service
            .rename_organization(RenameOrganization::new(organization_id, "Acme Corp"))
            .await
            .unwrap();

        assert_eq!(result.aggregate.name().unwrap().as_str(), "Acme Corp");

        let pending = outbox.messages_with_status(OutboxStatus::Pending).await;
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[1].event_type, "OrganizationUpdated");
    }

    #[tokio::test]
    async fn rename_to_same_name_stages_nothing() {
        let (service, outbox) = service();
        let organization_id = create_and_activate(&service).await;
        let before = outbox.pending_count().await.unwrap();

        let result = service
            .rename_organization(RenameOrganization::new(organization_id, "Acme"))
            .await
            .unwrap();

        assert!(result.events.is_empty());
        assert_eq!(outbox.pending_count().await.unwrap(), before);
    }

    #[tokio::test]
    async fn remove_stages_organization_deleted() {
        let (service, outbox) = service();
        let organization_id = create_and_activate(&service).await;

        let result = service
            .remove_organization(RemoveOrganization::new(organization_id, "cleanup"))
            .await
            .unwrap();

        assert_eq!(result.aggregate.state(), OrganizationState::Removed);

        let pending = outbox.messages_with_status(OutboxStatus::Pending).await;
        assert_eq!(pending.last().unwrap().event_type, "OrganizationDeleted");
    }

    #[tokio::test]
    async fn remove_twice_stages_once() {
        let (service, outbox) = service();
        let organization_id = create_and_activate(&service).await;

        service
            .remove_organization(RemoveOrganization::new(organization_id, "first"))
            .await
            .unwrap();
        let count_after_first = outbox.pending_count().await.unwrap();

        let result = service
            .remove_organization(RemoveOrganization::new(organization_id, "second"))
            .await
            .unwrap();

        assert!(result.events.is_empty());
        assert_eq!(outbox.pending_count().await.unwrap(), count_after_first);
    }

    #[tokio::test]
    async fn activate_before_create_fails() {
        let (service, _) = service();

        let result = service
            .activate_organization(ActivateOrganization::new(AggregateId::new(), "ext-123"))
            .await;

        assert!(matches!(
            result,
            Err(DomainError::Organization(OrganizationError::NotFound))
        ));
    }

    #[tokio::test]
    async fn get_missing_organization_returns_none() {
        let (service, _) = service();
        let result = service.get_organization(AggregateId::new()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn staged_message_carries_correlation() {
        let (service, outbox) = service();
        let correlation_id = CorrelationId::new();

        let cmd = CreateOrganization::for_tenant(TenantId::new(), "Acme")
            .with_correlation(correlation_id);
        let organization_id = cmd.organization_id;
        service.create_organization(cmd).await.unwrap();

        service
            .activate_organization(
                ActivateOrganization::new(organization_id, "ext-123")
                    .with_correlation(correlation_id),
            )
            .await
            .unwrap();

        let pending = outbox.messages_with_status(OutboxStatus::Pending).await;
        assert_eq!(pending[0].correlation_id, Some(correlation_id));
    }
}
