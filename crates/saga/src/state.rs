//! Saga status machine.

use serde::{Deserialize, Serialize};

/// The status of a saga in its lifecycle.
///
/// Status transitions:
/// ```text
/// Running ──┬──► Completed
///           └──► Compensating ──► Failed
/// ```
///
/// Terminal statuses are never left; instances stay in the store as an
/// audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SagaStatus {
    /// Saga steps are being executed.
    #[default]
    Running,

    /// A step failed and compensation is in progress.
    Compensating,

    /// All steps completed successfully (terminal).
    Completed,

    /// Compensation finished after a failure (terminal).
    Failed,
}

impl SagaStatus {
    /// Returns true if the saga can begin compensation.
    pub fn can_compensate(&self) -> bool {
        matches!(self, SagaStatus::Running)
    }

    /// Returns true if this is a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SagaStatus::Completed | SagaStatus::Failed)
    }

    /// Returns the status name as a string, as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaStatus::Running => "Running",
            SagaStatus::Compensating => "Compensating",
            SagaStatus::Completed => "Completed",
            SagaStatus::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for SagaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_status_is_running() {
        assert_eq!(SagaStatus::default(), SagaStatus::Running);
    }

    #[test]
    fn only_running_can_compensate() {
        assert!(SagaStatus::Running.can_compensate());
        assert!(!SagaStatus::Compensating.can_compensate());
        assert!(!SagaStatus::Completed.can_compensate());
        assert!(!SagaStatus::Failed.can_compensate());
    }

    #[test]
    fn terminal_statuses() {
        assert!(!SagaStatus::Running.is_terminal());
        assert!(!SagaStatus::Compensating.is_terminal());
        assert!(SagaStatus::Completed.is_terminal());
        assert!(SagaStatus::Failed.is_terminal());
    }

    #[test]
    fn display() {
        assert_eq!(SagaStatus::Running.to_string(), "Running");
        assert_eq!(SagaStatus::Compensating.to_string(), "Compensating");
        assert_eq!(SagaStatus::Completed.to_string(), "Completed");
        assert_eq!(SagaStatus::Failed.to_string(), "Failed");
    }

    #[test]
    fn serialization_round_trip() {
        let status = SagaStatus::Compensating;
        let json = serde_json::to_string(&status).unwrap();
        let deserialized: SagaStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(status, deserialized);
    }
}
