//! Shared types for the cross-service consistency core.
//!
//! Holds the strong-typed identifiers used by every crate and the
//! integration-event contract shared between the producing service
//! (domain + outbox) and consuming services (projections).

pub mod integration;
pub mod types;

pub use integration::{IntegrationEnvelope, ORGANIZATIONS_TOPIC, OrganizationIntegrationEvent};
pub use types::{AggregateId, CausationId, CorrelationId, TenantId};
