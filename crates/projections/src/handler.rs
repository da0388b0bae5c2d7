//! Handler trait for integration envelopes.

use async_trait::async_trait;
use common::IntegrationEnvelope;

use crate::Result;

/// What a handler did with an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The envelope changed the read model.
    Applied,

    /// The envelope was a duplicate or older than the current state.
    Discarded,
}

/// Folds integration envelopes into a read model.
///
/// Handlers must tolerate duplicate and out-of-order delivery; the
/// broker guarantees at-least-once, nothing more.
#[async_trait]
pub trait IntegrationHandler: Send + Sync {
    /// Returns the name of this handler.
    fn name(&self) -> &'static str;

    /// Event types this handler consumes.
    fn event_types(&self) -> &'static [&'static str];

    /// Handles a single envelope.
    async fn handle(&self, envelope: &IntegrationEnvelope) -> Result<ApplyOutcome>;
}
