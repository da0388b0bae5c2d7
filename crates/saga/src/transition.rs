//! Pure saga state machine.
//!
//! `transition` maps (current state, trigger) to (next state, actions).
//! It performs no I/O; the orchestrator persists the returned state and
//! executes the returned actions. Triggers that were already handled
//! produce no actions, which makes redelivery harmless.

use crate::instance::ProvisioningSaga;
use crate::state::SagaStatus;

/// External inputs that advance a saga.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SagaTrigger {
    /// Provisioning was requested. Only meaningful on a fresh instance.
    Start,

    /// The external directory created its counterpart.
    ExternalCreateSucceeded { external_id: String },

    /// The local aggregate was activated and `OrganizationCreated`
    /// staged. Only now is the saga allowed to complete.
    ActivationSucceeded,

    /// The external directory call failed or timed out.
    ExternalCreateFailed { reason: String },

    /// Compensation finished, the local aggregate is tombstoned.
    CompensationCompleted,
}

impl SagaTrigger {
    /// Name used in logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            SagaTrigger::Start => "Start",
            SagaTrigger::ExternalCreateSucceeded { .. } => "ExternalCreateSucceeded",
            SagaTrigger::ActivationSucceeded => "ActivationSucceeded",
            SagaTrigger::ExternalCreateFailed { .. } => "ExternalCreateFailed",
            SagaTrigger::CompensationCompleted => "CompensationCompleted",
        }
    }
}

/// Side effects the orchestrator must carry out after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SagaAction {
    /// Create the local organization aggregate (Provisioning state).
    CreateOrganization,

    /// Call the external directory, keyed by the saga ID.
    CallExternalDirectory,

    /// Activate the local aggregate with the external ID. Staging of
    /// the `OrganizationCreated` integration event rides along.
    ActivateOrganization { external_id: String },

    /// Tombstone the local aggregate as compensation.
    RemoveOrganization { reason: String },
}

/// Advances the saga by one trigger.
///
/// Returns the updated instance and the actions to execute. Already
/// handled or out-of-order triggers leave the state unchanged and
/// return no actions; terminal statuses are never left.
pub fn transition(
    mut saga: ProvisioningSaga,
    trigger: SagaTrigger,
) -> (ProvisioningSaga, Vec<SagaAction>) {
    let actions = match (&saga.status, trigger) {
        (SagaStatus::Running, SagaTrigger::Start) if !saga.started => {
            saga.started = true;
            saga.touch();
            vec![
                SagaAction::CreateOrganization,
                SagaAction::CallExternalDirectory,
            ]
        }

        // The saga stays Running until activation is durable. If the
        // activate write fails, the trigger can be redelivered and the
        // activation retried; a Completed status here would be terminal
        // and strand the aggregate in Provisioning.
        (SagaStatus::Running, SagaTrigger::ExternalCreateSucceeded { external_id }) => {
            saga.external_id = Some(external_id.clone());
            saga.touch();
            vec![SagaAction::ActivateOrganization { external_id }]
        }

        (SagaStatus::Running, SagaTrigger::ActivationSucceeded) if saga.external_id.is_some() => {
            saga.status = SagaStatus::Completed;
            saga.touch();
            vec![]
        }

        // A failure report after a recorded success is stale
        (SagaStatus::Running, SagaTrigger::ExternalCreateFailed { reason })
            if saga.external_id.is_none() =>
        {
            saga.failure_reason = Some(reason.clone());
            saga.status = SagaStatus::Compensating;
            saga.touch();
            vec![SagaAction::RemoveOrganization { reason }]
        }

        (SagaStatus::Compensating, SagaTrigger::CompensationCompleted) => {
            saga.status = SagaStatus::Failed;
            saga.touch();
            vec![]
        }

        // Duplicate or stale delivery, including anything arriving at a
        // terminal instance.
        _ => vec![],
    };

    (saga, actions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{AggregateId, CorrelationId, TenantId};

    fn fresh_saga() -> ProvisioningSaga {
        ProvisioningSaga::new(
            CorrelationId::new(),
            AggregateId::new(),
            TenantId::new(),
            "Acme",
        )
    }

    #[test]
    fn start_creates_and_calls_external() {
        let (saga, actions) = transition(fresh_saga(), SagaTrigger::Start);
        assert_eq!(saga.status, SagaStatus::Running);
        assert_eq!(
            actions,
            vec![
                SagaAction::CreateOrganization,
                SagaAction::CallExternalDirectory
            ]
        );
    }

    #[test]
    fn external_success_stays_running_and_activates() {
        let (saga, _) = transition(fresh_saga(), SagaTrigger::Start);
        let (saga, actions) = transition(
            saga,
            SagaTrigger::ExternalCreateSucceeded {
                external_id: "ext-123".to_string(),
            },
        );

        // Not yet terminal; completion waits for the activation write
        assert_eq!(saga.status, SagaStatus::Running);
        assert_eq!(saga.external_id.as_deref(), Some("ext-123"));
        assert_eq!(
            actions,
            vec![SagaAction::ActivateOrganization {
                external_id: "ext-123".to_string()
            }]
        );
    }

    #[test]
    fn activation_succeeded_completes() {
        let (saga, _) = transition(fresh_saga(), SagaTrigger::Start);
        let (saga, _) = transition(
            saga,
            SagaTrigger::ExternalCreateSucceeded {
                external_id: "ext-123".to_string(),
            },
        );
        let (saga, actions) = transition(saga, SagaTrigger::ActivationSucceeded);

        assert_eq!(saga.status, SagaStatus::Completed);
        assert!(saga.is_terminal());
        assert!(actions.is_empty());
    }

    #[test]
    fn activation_succeeded_without_external_id_is_ignored() {
        let (saga, _) = transition(fresh_saga(), SagaTrigger::Start);
        let (saga, actions) = transition(saga, SagaTrigger::ActivationSucceeded);

        assert_eq!(saga.status, SagaStatus::Running);
        assert!(actions.is_empty());
    }

    #[test]
    fn external_failure_compensates_then_fails() {
        let (saga, _) = transition(fresh_saga(), SagaTrigger::Start);
        let (saga, actions) = transition(
            saga,
            SagaTrigger::ExternalCreateFailed {
                reason: "directory unavailable".to_string(),
            },
        );

        assert_eq!(saga.status, SagaStatus::Compensating);
        assert_eq!(saga.failure_reason.as_deref(), Some("directory unavailable"));
        assert_eq!(
            actions,
            vec![SagaAction::RemoveOrganization {
                reason: "directory unavailable".to_string()
            }]
        );

        let (saga, actions) = transition(saga, SagaTrigger::CompensationCompleted);
        assert_eq!(saga.status, SagaStatus::Failed);
        assert!(saga.is_terminal());
        assert!(actions.is_empty());
    }

    #[test]
    fn duplicate_start_trigger_is_ignored() {
        let (saga, _) = transition(fresh_saga(), SagaTrigger::Start);
        let (saga, actions) = transition(saga, SagaTrigger::Start);
        assert_eq!(saga.status, SagaStatus::Running);
        assert!(actions.is_empty());
    }

    #[test]
    fn redelivered_success_reissues_activation() {
        let (saga, _) = transition(fresh_saga(), SagaTrigger::Start);
        let (saga, _) = transition(
            saga,
            SagaTrigger::ExternalCreateSucceeded {
                external_id: "ext-123".to_string(),
            },
        );

        // Redelivered before activation was recorded: retry the write
        let (saga, actions) = transition(
            saga,
            SagaTrigger::ExternalCreateSucceeded {
                external_id: "ext-123".to_string(),
            },
        );

        assert_eq!(saga.status, SagaStatus::Running);
        assert_eq!(
            actions,
            vec![SagaAction::ActivateOrganization {
                external_id: "ext-123".to_string()
            }]
        );
    }

    #[test]
    fn success_trigger_after_completion_is_ignored() {
        let (saga, _) = transition(fresh_saga(), SagaTrigger::Start);
        let (saga, _) = transition(
            saga,
            SagaTrigger::ExternalCreateSucceeded {
                external_id: "ext-123".to_string(),
            },
        );
        let (saga, _) = transition(saga, SagaTrigger::ActivationSucceeded);

        // Redelivered broker message
        let (saga, actions) = transition(
            saga,
            SagaTrigger::ExternalCreateSucceeded {
                external_id: "ext-123".to_string(),
            },
        );

        assert_eq!(saga.status, SagaStatus::Completed);
        assert!(actions.is_empty());
    }

    #[test]
    fn failure_after_completion_is_ignored() {
        let (saga, _) = transition(fresh_saga(), SagaTrigger::Start);
        let (saga, _) = transition(
            saga,
            SagaTrigger::ExternalCreateSucceeded {
                external_id: "ext-123".to_string(),
            },
        );
        let (saga, _) = transition(saga, SagaTrigger::ActivationSucceeded);

        let (saga, actions) = transition(
            saga,
            SagaTrigger::ExternalCreateFailed {
                reason: "late timeout".to_string(),
            },
        );

        // Terminal statuses are never left
        assert_eq!(saga.status, SagaStatus::Completed);
        assert!(saga.failure_reason.is_none());
        assert!(actions.is_empty());
    }

    #[test]
    fn late_failure_after_recorded_success_is_ignored() {
        let (saga, _) = transition(fresh_saga(), SagaTrigger::Start);
        let (saga, _) = transition(
            saga,
            SagaTrigger::ExternalCreateSucceeded {
                external_id: "ext-123".to_string(),
            },
        );

        let (saga, actions) = transition(
            saga,
            SagaTrigger::ExternalCreateFailed {
                reason: "late timeout".to_string(),
            },
        );

        assert_eq!(saga.status, SagaStatus::Running);
        assert!(saga.failure_reason.is_none());
        assert!(actions.is_empty());
    }

    #[test]
    fn compensation_completed_requires_compensating() {
        let (saga, actions) = transition(fresh_saga(), SagaTrigger::CompensationCompleted);
        assert_eq!(saga.status, SagaStatus::Running);
        assert!(actions.is_empty());
    }
}
