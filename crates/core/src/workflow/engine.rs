use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::request::RequestKind;
use crate::domain::step::StepOutcome;
use crate::domain::user::Role;
use crate::workflow::definition::{
    workflow_for, StatusPosition, WorkflowDefinition, STATUS_CANCELLED, STATUS_REJECTED,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowAction {
    Approve,
    Verify,
    Reject,
    Process,
    Cancel,
}

impl WorkflowAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Verify => "verify",
            Self::Reject => "reject",
            Self::Process => "process",
            Self::Cancel => "cancel",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "approve" => Some(Self::Approve),
            "verify" => Some(Self::Verify),
            "reject" => Some(Self::Reject),
            "process" => Some(Self::Process),
            "cancel" => Some(Self::Cancel),
            _ => None,
        }
    }

    fn outcome(&self) -> StepOutcome {
        match self {
            Self::Approve => StepOutcome::Approved,
            Self::Verify => StepOutcome::Verified,
            Self::Reject => StepOutcome::Rejected,
            Self::Process => StepOutcome::Processed,
            Self::Cancel => StepOutcome::Cancelled,
        }
    }
}

impl std::fmt::Display for WorkflowAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who is attempting a transition, relative to the request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActorContext {
    pub role: Role,
    pub is_requestor: bool,
    pub can_override: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub kind: RequestKind,
    pub from: String,
    pub to: &'static str,
    pub action: WorkflowAction,
    /// Role recorded on the approval step.
    pub acting_role: Role,
    pub outcome: StepOutcome,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("status `{status}` is not part of the {kind} workflow")]
    UnknownStatus { kind: RequestKind, status: String },
    #[error("cannot {action} a request in status `{status}`")]
    InvalidTransition { status: String, action: WorkflowAction },
    #[error("role `{actor_role}` may not {action} a request in status `{status}` (requires `{required_role}`)")]
    NotPermitted { status: String, action: WorkflowAction, actor_role: Role, required_role: Role },
}

pub struct WorkflowEngine {
    definition: &'static WorkflowDefinition,
}

impl WorkflowEngine {
    pub fn new(definition: &'static WorkflowDefinition) -> Self {
        Self { definition }
    }

    pub fn for_kind(kind: RequestKind) -> Self {
        Self::new(workflow_for(kind))
    }

    pub fn initial_status(&self) -> &'static str {
        self.definition.initial_status()
    }

    pub fn apply(
        &self,
        current: &str,
        action: WorkflowAction,
        actor: &ActorContext,
    ) -> Result<Transition, WorkflowError> {
        let definition = self.definition;
        let position = definition.position(current).ok_or_else(|| WorkflowError::UnknownStatus {
            kind: definition.kind,
            status: current.to_string(),
        })?;
        let invalid =
            || WorkflowError::InvalidTransition { status: current.to_string(), action };

        let (to, acting_role) = match (position, action) {
            (StatusPosition::Stage(index), WorkflowAction::Approve)
            | (StatusPosition::Stage(index), WorkflowAction::Verify)
            | (StatusPosition::Stage(index), WorkflowAction::Reject) => {
                let stage = &definition.stages[index];
                if !stage.actions.contains(&action) {
                    return Err(invalid());
                }
                authorize(current, action, actor, stage.role)?;
                let to = if action == WorkflowAction::Reject {
                    STATUS_REJECTED
                } else {
                    definition.status_at(StatusPosition::Stage(index + 1))
                };
                (to, stage.role)
            }
            (StatusPosition::Approved, WorkflowAction::Process) => {
                authorize(current, action, actor, definition.processing.role)?;
                (definition.processing.processed_status, definition.processing.role)
            }
            (StatusPosition::Approved, WorkflowAction::Reject)
                if definition.processing.can_reject =>
            {
                authorize(current, action, actor, definition.processing.role)?;
                (STATUS_REJECTED, definition.processing.role)
            }
            (StatusPosition::Stage(_), WorkflowAction::Cancel)
            | (StatusPosition::Approved, WorkflowAction::Cancel) => {
                if !actor.is_requestor && !actor.can_override {
                    return Err(WorkflowError::NotPermitted {
                        status: current.to_string(),
                        action,
                        actor_role: actor.role,
                        required_role: Role::Requestor,
                    });
                }
                let acting_role = if actor.is_requestor { Role::Requestor } else { actor.role };
                (STATUS_CANCELLED, acting_role)
            }
            _ => return Err(invalid()),
        };

        Ok(Transition {
            kind: definition.kind,
            from: current.to_string(),
            to,
            action,
            acting_role,
            outcome: action.outcome(),
        })
    }
}

fn authorize(
    status: &str,
    action: WorkflowAction,
    actor: &ActorContext,
    required_role: Role,
) -> Result<(), WorkflowError> {
    if actor.role == required_role || actor.can_override {
        return Ok(());
    }
    Err(WorkflowError::NotPermitted {
        status: status.to_string(),
        action,
        actor_role: actor.role,
        required_role,
    })
}

#[cfg(test)]
mod tests {
    use crate::domain::request::RequestKind;
    use crate::domain::step::StepOutcome;
    use crate::domain::user::Role;
    use crate::workflow::definition::{workflow_for, StatusPosition};
    use crate::workflow::engine::{ActorContext, WorkflowAction, WorkflowEngine, WorkflowError};

    fn actor(role: Role) -> ActorContext {
        ActorContext { role, is_requestor: false, can_override: false }
    }

    fn requestor() -> ActorContext {
        ActorContext { role: Role::Requestor, is_requestor: true, can_override: false }
    }

    const ACTIONS: [WorkflowAction; 5] = [
        WorkflowAction::Approve,
        WorkflowAction::Verify,
        WorkflowAction::Reject,
        WorkflowAction::Process,
        WorkflowAction::Cancel,
    ];

    #[test]
    fn trf_happy_path_reaches_processed() {
        let engine = WorkflowEngine::for_kind(RequestKind::Trf);
        let mut status = engine.initial_status().to_string();

        for role in [Role::DepartmentFocal, Role::LineManager, Role::Hod] {
            let transition =
                engine.apply(&status, WorkflowAction::Approve, &actor(role)).expect("approve");
            assert_eq!(transition.acting_role, role);
            assert_eq!(transition.outcome, StepOutcome::Approved);
            status = transition.to.to_string();
        }
        assert_eq!(status, "Approved");

        let processed = engine
            .apply(&status, WorkflowAction::Process, &actor(Role::TicketingAdmin))
            .expect("process");
        assert_eq!(processed.to, "Processed");
    }

    #[test]
    fn claims_land_with_claims_admin_after_hod() {
        let engine = WorkflowEngine::for_kind(RequestKind::Claims);
        let transition = engine
            .apply("Pending HOD", WorkflowAction::Approve, &actor(Role::Hod))
            .expect("hod approve");

        assert_eq!(transition.to, "Processing with Claims Admin");
    }

    #[test]
    fn verify_is_only_accepted_at_department_focal() {
        let engine = WorkflowEngine::for_kind(RequestKind::Claims);

        let verified = engine
            .apply("Pending Verification", WorkflowAction::Verify, &actor(Role::DepartmentFocal))
            .expect("legacy status verify");
        assert_eq!(verified.to, "Pending Line Manager");
        assert_eq!(verified.outcome, StepOutcome::Verified);

        let error = engine
            .apply("Pending Line Manager", WorkflowAction::Verify, &actor(Role::LineManager))
            .expect_err("verify at line manager");
        assert_eq!(
            error,
            WorkflowError::InvalidTransition {
                status: "Pending Line Manager".to_string(),
                action: WorkflowAction::Verify
            }
        );
    }

    #[test]
    fn legacy_finance_status_can_be_processed() {
        let engine = WorkflowEngine::for_kind(RequestKind::Claims);
        let transition = engine
            .apply("Pending Finance Approval", WorkflowAction::Process, &actor(Role::ClaimsAdmin))
            .expect("legacy process");

        assert_eq!(transition.from, "Pending Finance Approval");
        assert_eq!(transition.to, "Processed");
    }

    #[test]
    fn wrong_role_is_not_permitted() {
        let engine = WorkflowEngine::for_kind(RequestKind::Visa);
        let error = engine
            .apply("Pending HOD", WorkflowAction::Approve, &actor(Role::LineManager))
            .expect_err("line manager cannot approve hod stage");

        assert!(matches!(
            error,
            WorkflowError::NotPermitted { required_role: Role::Hod, actor_role: Role::LineManager, .. }
        ));
    }

    #[test]
    fn override_permission_acts_at_any_stage() {
        let engine = WorkflowEngine::for_kind(RequestKind::Transport);
        let admin =
            ActorContext { role: Role::SystemAdmin, is_requestor: false, can_override: true };

        let transition =
            engine.apply("Pending HOD", WorkflowAction::Approve, &admin).expect("override");
        assert_eq!(transition.acting_role, Role::Hod);
        assert_eq!(transition.to, "Approved");
    }

    #[test]
    fn only_the_requestor_or_override_can_cancel() {
        let engine = WorkflowEngine::for_kind(RequestKind::Accommodation);

        let cancelled = engine
            .apply("Pending Line Manager", WorkflowAction::Cancel, &requestor())
            .expect("requestor cancel");
        assert_eq!(cancelled.to, "Cancelled");
        assert_eq!(cancelled.acting_role, Role::Requestor);

        let error = engine
            .apply("Pending Line Manager", WorkflowAction::Cancel, &actor(Role::LineManager))
            .expect_err("approver cannot cancel");
        assert!(matches!(error, WorkflowError::NotPermitted { required_role: Role::Requestor, .. }));
    }

    #[test]
    fn processing_rejection_depends_on_module() {
        let claims = WorkflowEngine::for_kind(RequestKind::Claims);
        let rejected = claims
            .apply("Processing with Claims Admin", WorkflowAction::Reject, &actor(Role::ClaimsAdmin))
            .expect("claims admin can reject");
        assert_eq!(rejected.to, "Rejected");

        let trf = WorkflowEngine::for_kind(RequestKind::Trf);
        let error = trf
            .apply("Approved", WorkflowAction::Reject, &actor(Role::TicketingAdmin))
            .expect_err("ticketing cannot reject");
        assert!(matches!(error, WorkflowError::InvalidTransition { .. }));
    }

    #[test]
    fn unknown_status_is_reported() {
        let engine = WorkflowEngine::for_kind(RequestKind::Trf);
        let error = engine
            .apply("Awaiting Budget", WorkflowAction::Approve, &actor(Role::DepartmentFocal))
            .expect_err("unknown status");

        assert_eq!(error.to_string(), "status `Awaiting Budget` is not part of the trf workflow");
    }

    /// Every status/action pair outside the allow-list is rejected as an
    /// invalid transition, even for a caller holding the override permission.
    #[test]
    fn pairs_outside_the_allow_list_are_invalid_transitions() {
        let superuser =
            ActorContext { role: Role::SystemAdmin, is_requestor: true, can_override: true };

        for kind in RequestKind::ALL {
            let engine = WorkflowEngine::for_kind(kind);
            let definition = workflow_for(kind);
            for status in definition.known_statuses() {
                let position = definition.position(status).expect("known status");
                for action in ACTIONS {
                    let allowed = match (position, action) {
                        (StatusPosition::Stage(0), _) => action != WorkflowAction::Process,
                        (StatusPosition::Stage(_), action) => matches!(
                            action,
                            WorkflowAction::Approve
                                | WorkflowAction::Reject
                                | WorkflowAction::Cancel
                        ),
                        (StatusPosition::Approved, WorkflowAction::Process)
                        | (StatusPosition::Approved, WorkflowAction::Cancel) => true,
                        (StatusPosition::Approved, WorkflowAction::Reject) => {
                            definition.processing.can_reject
                        }
                        _ => false,
                    };

                    let result = engine.apply(status, action, &superuser);
                    if allowed {
                        assert!(result.is_ok(), "{kind} {status} {action} should be allowed");
                    } else {
                        assert_eq!(
                            result,
                            Err(WorkflowError::InvalidTransition {
                                status: status.to_string(),
                                action
                            }),
                            "{kind} {status} {action} should be rejected"
                        );
                    }
                }
            }
        }
    }
}
