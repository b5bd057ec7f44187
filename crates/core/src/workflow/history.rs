//! Display reconstruction of a request's approval chain.
//!
//! The stored audit rows only cover steps that already happened. Views need
//! the whole chain, so the rows are merged with the module's workflow table
//! and the unreached stages are filled with placeholders. Nothing here is
//! persisted.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::step::{ApprovalStep, StepOutcome};
use crate::domain::user::Role;
use crate::workflow::definition::{StatusPosition, WorkflowDefinition};

pub const STEP_PENDING: &str = "Pending";
pub const STEP_NOT_STARTED: &str = "Not Started";
pub const ACTOR_TBD: &str = "TBD";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WorkflowStepView {
    pub role: Role,
    pub role_label: &'static str,
    pub actor: String,
    pub status: String,
    pub date: Option<DateTime<Utc>>,
    pub comments: Option<String>,
}

impl WorkflowStepView {
    fn from_row(row: &ApprovalStep, status: &str) -> Self {
        Self {
            role: row.role,
            role_label: row.role.label(),
            actor: row.actor_name.clone(),
            status: status.to_string(),
            date: Some(row.step_date),
            comments: row.comments.clone(),
        }
    }

    fn placeholder(role: Role, status: &str, actor: &str) -> Self {
        Self {
            role,
            role_label: role.label(),
            actor: actor.to_string(),
            status: status.to_string(),
            date: None,
            comments: None,
        }
    }
}

pub fn reconstruct(
    definition: &WorkflowDefinition,
    current_status: &str,
    steps: &[ApprovalStep],
) -> Vec<WorkflowStepView> {
    let position = definition.position(current_status);
    let mut view = Vec::with_capacity(definition.stages.len() + 2);

    match latest(steps, |row| row.outcome == StepOutcome::Submitted) {
        Some(row) => view.push(WorkflowStepView::from_row(row, StepOutcome::Submitted.as_str())),
        None => view.push(WorkflowStepView::placeholder(
            Role::Requestor,
            StepOutcome::Submitted.as_str(),
            Role::Requestor.label(),
        )),
    }

    let approved = StepOutcome::Approved.as_str();
    for (index, stage) in definition.stages.iter().enumerate() {
        let row = latest(steps, |row| row.role == stage.role && row.outcome.is_forward_approval());

        match position {
            Some(StatusPosition::Stage(current)) if index == current => {
                view.push(WorkflowStepView::placeholder(stage.role, STEP_PENDING, ACTOR_TBD));
            }
            Some(StatusPosition::Stage(current)) if index > current => {
                view.push(WorkflowStepView::placeholder(stage.role, STEP_NOT_STARTED, ACTOR_TBD));
            }
            Some(StatusPosition::Stage(_))
            | Some(StatusPosition::Approved)
            | Some(StatusPosition::Processed) => match row {
                Some(row) => view.push(WorkflowStepView::from_row(row, row.outcome.as_str())),
                // Legacy rows approved before steps were recorded.
                None => view.push(WorkflowStepView::placeholder(stage.role, approved, "N/A")),
            },
            Some(StatusPosition::Rejected) | Some(StatusPosition::Cancelled) => match row {
                Some(row) => view.push(WorkflowStepView::from_row(row, row.outcome.as_str())),
                None => break,
            },
            None => match row {
                Some(row) => view.push(WorkflowStepView::from_row(row, row.outcome.as_str())),
                None => {
                    view.push(WorkflowStepView::placeholder(stage.role, STEP_NOT_STARTED, ACTOR_TBD))
                }
            },
        }
    }

    match position {
        Some(StatusPosition::Processed) => {
            let processed = StepOutcome::Processed.as_str();
            match latest(steps, |row| row.outcome == StepOutcome::Processed) {
                Some(row) => view.push(WorkflowStepView::from_row(row, processed)),
                None => view.push(WorkflowStepView::placeholder(
                    definition.processing.role,
                    processed,
                    "N/A",
                )),
            }
        }
        Some(terminal @ (StatusPosition::Rejected | StatusPosition::Cancelled)) => {
            let outcome = if terminal == StatusPosition::Rejected {
                StepOutcome::Rejected
            } else {
                StepOutcome::Cancelled
            };
            match latest(steps, |row| row.outcome == outcome) {
                Some(row) => view.push(WorkflowStepView::from_row(row, outcome.as_str())),
                None => view.push(WorkflowStepView::placeholder(
                    Role::Requestor,
                    outcome.as_str(),
                    "N/A",
                )),
            }
        }
        _ => {}
    }

    view
}

fn latest<F>(steps: &[ApprovalStep], predicate: F) -> Option<&ApprovalStep>
where
    F: Fn(&ApprovalStep) -> bool,
{
    steps.iter().filter(|row| predicate(row)).max_by_key(|row| row.step_date)
}
