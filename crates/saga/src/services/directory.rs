//! External directory trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use common::CorrelationId;

use crate::error::SagaError;

/// Trait for the external directory system that organizations are
/// provisioned into.
///
/// Calls are keyed by saga ID so a redelivered trigger asks the
/// directory the same question and gets the same answer.
#[async_trait]
pub trait ExternalDirectory: Send + Sync {
    /// Creates the organization in the external system.
    ///
    /// Returns the identifier the directory assigned.
    async fn create_organization(
        &self,
        saga_id: CorrelationId,
        name: &str,
    ) -> Result<String, SagaError>;
}

#[derive(Debug, Default)]
struct InMemoryDirectoryState {
    created: HashMap<CorrelationId, String>,
    next_id: u32,
    fail_on_create: bool,
}

/// In-memory external directory for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    state: Arc<RwLock<InMemoryDirectoryState>>,
    delay: Arc<RwLock<Option<Duration>>>,
}

impl InMemoryDirectory {
    /// Creates a new in-memory directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the directory to fail on the next create call.
    pub fn set_fail_on_create(&self, fail: bool) {
        self.state.write().unwrap().fail_on_create = fail;
    }

    /// Configures an artificial response delay, for timeout tests.
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.write().unwrap() = delay;
    }

    /// Returns the number of organizations the directory holds.
    pub fn created_count(&self) -> usize {
        self.state.read().unwrap().created.len()
    }

    /// Returns the external ID assigned for a saga, if any.
    pub fn external_id_for(&self, saga_id: CorrelationId) -> Option<String> {
        self.state.read().unwrap().created.get(&saga_id).cloned()
    }
}

#[async_trait]
impl ExternalDirectory for InMemoryDirectory {
    async fn create_organization(
        &self,
        saga_id: CorrelationId,
        _name: &str,
    ) -> Result<String, SagaError> {
        let delay = *self.delay.read().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.write().unwrap();

        if state.fail_on_create {
            return Err(SagaError::ExternalStep(
                "directory rejected the organization".to_string(),
            ));
        }

        // Same saga asks again, same answer
        if let Some(existing) = state.created.get(&saga_id) {
            return Ok(existing.clone());
        }

        state.next_id += 1;
        let external_id = format!("ext-{:04}", state.next_id);
        state.created.insert(saga_id, external_id.clone());

        Ok(external_id)
    }
}
