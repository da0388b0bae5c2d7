//! Integration event consumer for the organization context.
//!
//! This crate is the receiving side of the cross-service contract:
//! - [`IntegrationHandler`] trait for folding envelopes into read models
//! - [`IntegrationConsumer`] dispatching envelopes through an explicit
//!   handler registry built at startup
//! - [`OrganizationMirror`], an idempotent last-write-wins mirror of
//!   organizations owned by another service

pub mod consumer;
pub mod error;
pub mod handler;
pub mod mirror;

pub use consumer::{DeadLetteredEnvelope, IntegrationConsumer};
pub use error::{ProjectionError, Result};
pub use handler::{ApplyOutcome, IntegrationHandler};
pub use mirror::{OrganizationMirror, OrganizationRecord};
