//! Publisher configuration loaded from environment variables.

use std::time::Duration;

/// Outbox publisher configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `OUTBOX_POLL_MS`: poll interval in milliseconds (default: `1000`)
/// - `OUTBOX_BATCH_SIZE`: messages claimed per cycle (default: `100`)
/// - `OUTBOX_MAX_RETRIES`: delivery attempts before dead-lettering (default: `3`)
/// - `OUTBOX_PUBLISH_TIMEOUT_MS`: per-message broker call budget (default: `5000`)
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    pub poll_interval: Duration,
    pub batch_size: usize,
    pub max_retries: u32,
    pub publish_timeout: Duration,
}

impl PublisherConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            poll_interval: std::env::var("OUTBOX_POLL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(Duration::from_millis(1000)),
            batch_size: std::env::var("OUTBOX_BATCH_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(100),
            max_retries: std::env::var("OUTBOX_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3),
            publish_timeout: std::env::var("OUTBOX_PUBLISH_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(Duration::from_millis(5000)),
        }
    }
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1000),
            batch_size: 100,
            max_retries: 3,
            publish_timeout: Duration::from_millis(5000),
        }
    }
}

/// Cooldown before the next delivery attempt, by attempts already made.
pub(crate) fn retry_cooldown(retry_count: u32) -> Duration {
    match retry_count {
        0 => Duration::from_millis(100),
        1 => Duration::from_millis(250),
        _ => Duration::from_millis(500),
    }
}
