//! Last-write-wins mirror of organizations owned by another service.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AggregateId, IntegrationEnvelope, OrganizationIntegrationEvent, TenantId};
use tokio::sync::RwLock;

use crate::Result;
use crate::handler::{ApplyOutcome, IntegrationHandler};

/// Locally mirrored organization state.
///
/// `tenant_id` and `external_id` are optional because an update or
/// delete can arrive before the create that carries them.
#[derive(Debug, Clone)]
pub struct OrganizationRecord {
    pub id: AggregateId,
    pub tenant_id: Option<TenantId>,
    pub name: String,
    pub external_id: Option<String>,
    pub is_deleted: bool,
    pub last_updated_at: DateTime<Utc>,
}

/// Read model mirroring organizations from their owning service.
///
/// Conflict resolution is last-write-wins on the producer's
/// `occurred_at`: an envelope only changes a record when it is strictly
/// newer than the record's `last_updated_at`. Deletes tombstone the
/// record; nothing is ever physically removed.
#[derive(Clone, Default)]
pub struct OrganizationMirror {
    records: Arc<RwLock<HashMap<AggregateId, OrganizationRecord>>>,
}

impl OrganizationMirror {
    /// Creates a new empty mirror.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets a mirrored organization, tombstones included.
    pub async fn get(&self, id: AggregateId) -> Option<OrganizationRecord> {
        self.records.read().await.get(&id).cloned()
    }

    /// Gets all non-deleted organizations.
    pub async fn active(&self) -> Vec<OrganizationRecord> {
        self.records
            .read()
            .await
            .values()
            .filter(|r| !r.is_deleted)
            .cloned()
            .collect()
    }

    /// Returns the number of mirrored records, tombstones included.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Returns true if the mirror holds no records.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    async fn apply(
        &self,
        id: AggregateId,
        occurred_at: DateTime<Utc>,
        insert: impl FnOnce() -> OrganizationRecord,
        update: impl FnOnce(&mut OrganizationRecord),
    ) -> ApplyOutcome {
        let mut records = self.records.write().await;

        match records.get_mut(&id) {
            None => {
                records.insert(id, insert());
                ApplyOutcome::Applied
            }
            // Strictly newer only; ties and older envelopes lose
            Some(record) if occurred_at > record.last_updated_at => {
                update(record);
                record.last_updated_at = occurred_at;
                ApplyOutcome::Applied
            }
            Some(_) => ApplyOutcome::Discarded,
        }
    }
}

#[async_trait]
impl IntegrationHandler for OrganizationMirror {
    fn name(&self) -> &'static str {
        "OrganizationMirror"
    }

    fn event_types(&self) -> &'static [&'static str] {
        &[
            "OrganizationCreated",
            "OrganizationUpdated",
            "OrganizationDeleted",
        ]
    }

    async fn handle(&self, envelope: &IntegrationEnvelope) -> Result<ApplyOutcome> {
        let event: OrganizationIntegrationEvent = envelope.decode()?;
        let occurred_at = envelope.occurred_at;

        let outcome = match event {
            OrganizationIntegrationEvent::OrganizationCreated(data) => {
                self.apply(
                    data.organization_id,
                    occurred_at,
                    || OrganizationRecord {
                        id: data.organization_id,
                        tenant_id: Some(data.tenant_id),
                        name: data.name.clone(),
                        external_id: Some(data.external_id.clone()),
                        is_deleted: false,
                        last_updated_at: occurred_at,
                    },
                    |record| {
                        record.tenant_id = Some(data.tenant_id);
                        record.name = data.name.clone();
                        record.external_id = Some(data.external_id.clone());
                    },
                )
                .await
            }

            OrganizationIntegrationEvent::OrganizationUpdated(data) => {
                self.apply(
                    data.organization_id,
                    occurred_at,
                    || OrganizationRecord {
                        id: data.organization_id,
                        tenant_id: None,
                        name: data.name.clone(),
                        external_id: None,
                        is_deleted: false,
                        last_updated_at: occurred_at,
                    },
                    |record| {
                        record.name = data.name.clone();
                    },
                )
                .await
            }

            OrganizationIntegrationEvent::OrganizationDeleted(data) => {
                self.apply(
                    data.organization_id,
                    occurred_at,
                    || OrganizationRecord {
                        id: data.organization_id,
                        tenant_id: None,
                        name: String::new(),
                        external_id: None,
                        is_deleted: true,
                        last_updated_at: occurred_at,
                    },
                    |record| {
                        record.is_deleted = true;
                    },
                )
                .await
            }
        };

        match outcome {
            ApplyOutcome::Applied => {
                metrics::counter!("consumer_events_applied").increment(1);
            }
            ApplyOutcome::Discarded => {
                metrics::counter!("consumer_events_discarded").increment(1);
                tracing::debug!(
                    event_type = %envelope.event_type,
                    occurred_at = %occurred_at,
                    "discarded stale envelope"
                );
            }
        }

        Ok(outcome)
    }
}
