//! Saga orchestration for organization provisioning.
//!
//! A provisioning saga coordinates the local organization aggregate
//! with an external directory system:
//! 1. Create the organization locally (Provisioning)
//! 2. Create the counterpart in the external directory
//! 3. Activate locally and announce `OrganizationCreated`
//!
//! If the external step fails or times out, the local aggregate is
//! removed (tombstoned) as compensation and the saga ends Failed.
//!
//! Saga state lives in a [`SagaStore`], not in the event store; the
//! state machine itself is a pure function in [`transition`], so every
//! path is testable without I/O.

pub mod config;
pub mod error;
pub mod instance;
pub mod orchestrator;
pub mod services;
pub mod state;
pub mod store;
pub mod transition;

pub use config::OrchestratorConfig;
pub use error::{Result, SagaError};
pub use instance::ProvisioningSaga;
pub use orchestrator::{ProvisioningOrchestrator, StartProvisioning};
pub use services::{ExternalDirectory, InMemoryDirectory};
pub use state::SagaStatus;
pub use store::{InMemorySagaStore, PostgresSagaStore, SagaStore};
pub use transition::{SagaAction, SagaTrigger, transition};
