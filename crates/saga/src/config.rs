//! Orchestrator configuration loaded from environment variables.

use std::time::Duration;

/// Saga orchestrator configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `DIRECTORY_TIMEOUT_MS`: external directory call timeout in
///   milliseconds (default: `2000`). A timed-out call is treated the
///   same as a failed one.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub directory_timeout: Duration,
}

impl OrchestratorConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            directory_timeout: std::env::var("DIRECTORY_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(Duration::from_millis(2000)),
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            directory_timeout: Duration::from_millis(2000),
        }
    }
}
