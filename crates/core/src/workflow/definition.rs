//! Declarative workflow tables, one per request module.
//!
//! Every module shares the Department Focal → Line Manager → HOD approval
//! chain and differs only in what happens after the last approval: the
//! status it lands in, who processes it and what the processed status is.

use serde::Serialize;

use crate::domain::request::RequestKind;
use crate::domain::user::Role;
use crate::workflow::WorkflowAction;

pub const STATUS_REJECTED: &str = "Rejected";
pub const STATUS_CANCELLED: &str = "Cancelled";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ApprovalStage {
    pub status: &'static str,
    pub role: Role,
    pub actions: &'static [WorkflowAction],
    /// Older status names still found on stored rows.
    pub legacy_aliases: &'static [&'static str],
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProcessingStage {
    pub role: Role,
    pub processed_status: &'static str,
    pub can_reject: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WorkflowDefinition {
    pub kind: RequestKind,
    pub stages: &'static [ApprovalStage],
    pub approved_status: &'static str,
    pub approved_aliases: &'static [&'static str],
    pub processing: ProcessingStage,
}

/// Where a status sits in a workflow.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusPosition {
    Stage(usize),
    Approved,
    Processed,
    Rejected,
    Cancelled,
}

impl StatusPosition {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Processed | Self::Rejected | Self::Cancelled)
    }
}

const APPROVAL_STAGES: &[ApprovalStage] = &[
    ApprovalStage {
        status: "Pending Department Focal",
        role: Role::DepartmentFocal,
        actions: &[WorkflowAction::Approve, WorkflowAction::Verify, WorkflowAction::Reject],
        legacy_aliases: &["Pending Verification"],
    },
    ApprovalStage {
        status: "Pending Line Manager",
        role: Role::LineManager,
        actions: &[WorkflowAction::Approve, WorkflowAction::Reject],
        legacy_aliases: &[],
    },
    ApprovalStage {
        status: "Pending HOD",
        role: Role::Hod,
        actions: &[WorkflowAction::Approve, WorkflowAction::Reject],
        legacy_aliases: &[],
    },
];

static TRF_WORKFLOW: WorkflowDefinition = WorkflowDefinition {
    kind: RequestKind::Trf,
    stages: APPROVAL_STAGES,
    approved_status: "Approved",
    approved_aliases: &[],
    processing: ProcessingStage {
        role: Role::TicketingAdmin,
        processed_status: "Processed",
        can_reject: false,
    },
};

static CLAIMS_WORKFLOW: WorkflowDefinition = WorkflowDefinition {
    kind: RequestKind::Claims,
    stages: APPROVAL_STAGES,
    approved_status: "Processing with Claims Admin",
    approved_aliases: &["Pending Finance Approval"],
    processing: ProcessingStage {
        role: Role::ClaimsAdmin,
        processed_status: "Processed",
        can_reject: true,
    },
};

static VISA_WORKFLOW: WorkflowDefinition = WorkflowDefinition {
    kind: RequestKind::Visa,
    stages: APPROVAL_STAGES,
    approved_status: "Processing with Visa Admin",
    approved_aliases: &[],
    processing: ProcessingStage {
        role: Role::VisaAdmin,
        processed_status: "Processed",
        can_reject: true,
    },
};

static TRANSPORT_WORKFLOW: WorkflowDefinition = WorkflowDefinition {
    kind: RequestKind::Transport,
    stages: APPROVAL_STAGES,
    approved_status: "Approved",
    approved_aliases: &[],
    processing: ProcessingStage {
        role: Role::TransportAdmin,
        processed_status: "Processed",
        can_reject: false,
    },
};

static ACCOMMODATION_WORKFLOW: WorkflowDefinition = WorkflowDefinition {
    kind: RequestKind::Accommodation,
    stages: APPROVAL_STAGES,
    approved_status: "Approved",
    approved_aliases: &[],
    processing: ProcessingStage {
        role: Role::AccommodationAdmin,
        processed_status: "Confirmed",
        can_reject: false,
    },
};

pub fn workflow_for(kind: RequestKind) -> &'static WorkflowDefinition {
    match kind {
        RequestKind::Trf => &TRF_WORKFLOW,
        RequestKind::Claims => &CLAIMS_WORKFLOW,
        RequestKind::Visa => &VISA_WORKFLOW,
        RequestKind::Transport => &TRANSPORT_WORKFLOW,
        RequestKind::Accommodation => &ACCOMMODATION_WORKFLOW,
    }
}

fn same_status(left: &str, right: &str) -> bool {
    left.trim().eq_ignore_ascii_case(right)
}

impl WorkflowDefinition {
    pub fn initial_status(&self) -> &'static str {
        self.stages[0].status
    }

    pub fn position(&self, status: &str) -> Option<StatusPosition> {
        if let Some(index) = self.stages.iter().position(|stage| {
            same_status(status, stage.status)
                || stage.legacy_aliases.iter().any(|alias| same_status(status, alias))
        }) {
            return Some(StatusPosition::Stage(index));
        }
        if same_status(status, self.approved_status)
            || self.approved_aliases.iter().any(|alias| same_status(status, alias))
        {
            return Some(StatusPosition::Approved);
        }
        if same_status(status, self.processing.processed_status) {
            return Some(StatusPosition::Processed);
        }
        if same_status(status, STATUS_REJECTED) {
            return Some(StatusPosition::Rejected);
        }
        if same_status(status, STATUS_CANCELLED) {
            return Some(StatusPosition::Cancelled);
        }
        None
    }

    pub fn status_at(&self, position: StatusPosition) -> &'static str {
        match position {
            StatusPosition::Stage(index) => {
                self.stages.get(index).map(|stage| stage.status).unwrap_or(self.approved_status)
            }
            StatusPosition::Approved => self.approved_status,
            StatusPosition::Processed => self.processing.processed_status,
            StatusPosition::Rejected => STATUS_REJECTED,
            StatusPosition::Cancelled => STATUS_CANCELLED,
        }
    }

    /// Canonical name for `status`, folding legacy aliases.
    pub fn canonical_status(&self, status: &str) -> Option<&'static str> {
        self.position(status).map(|position| self.status_at(position))
    }

    pub fn known_statuses(&self) -> Vec<&'static str> {
        let mut statuses: Vec<&'static str> = self.stages.iter().map(|stage| stage.status).collect();
        statuses.extend([
            self.approved_status,
            self.processing.processed_status,
            STATUS_REJECTED,
            STATUS_CANCELLED,
        ]);
        statuses
    }

    /// The canonical name of `status` plus every legacy alias stored for it.
    pub fn status_variants(&self, status: &str) -> Vec<&'static str> {
        let Some(position) = self.position(status) else {
            return Vec::new();
        };
        let mut variants = vec![self.status_at(position)];
        match position {
            StatusPosition::Stage(index) => {
                variants.extend(self.stages[index].legacy_aliases.iter().copied());
            }
            StatusPosition::Approved => variants.extend(self.approved_aliases.iter().copied()),
            _ => {}
        }
        variants
    }

    /// Role expected to act next, if the request is still moving.
    pub fn pending_role(&self, status: &str) -> Option<Role> {
        match self.position(status)? {
            StatusPosition::Stage(index) => Some(self.stages[index].role),
            StatusPosition::Approved => Some(self.processing.role),
            _ => None,
        }
    }

    /// Statuses a role is expected to act on, including legacy aliases.
    pub fn statuses_awaiting(&self, role: Role) -> Vec<&'static str> {
        let mut statuses = Vec::new();
        for stage in self.stages.iter().filter(|stage| stage.role == role) {
            statuses.push(stage.status);
            statuses.extend(stage.legacy_aliases.iter().copied());
        }
        if self.processing.role == role {
            statuses.push(self.approved_status);
            statuses.extend(self.approved_aliases.iter().copied());
        }
        statuses
    }

    /// Payload edits are only allowed before the first approver acts.
    pub fn is_editable(&self, status: &str) -> bool {
        self.position(status) == Some(StatusPosition::Stage(0))
    }

    pub fn deletable_statuses(&self) -> Vec<&'static str> {
        let mut statuses = self.status_variants(self.initial_status());
        statuses.extend([STATUS_REJECTED, STATUS_CANCELLED]);
        statuses
    }

    pub fn is_deletable(&self, status: &str) -> bool {
        matches!(
            self.position(status),
            Some(StatusPosition::Stage(0) | StatusPosition::Rejected | StatusPosition::Cancelled)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{workflow_for, StatusPosition};
    use crate::domain::request::RequestKind;
    use crate::domain::user::Role;

    #[test]
    fn legacy_aliases_resolve_to_canonical_statuses() {
        let claims = workflow_for(RequestKind::Claims);

        assert_eq!(claims.canonical_status("Pending Verification"), Some("Pending Department Focal"));
        assert_eq!(
            claims.canonical_status("pending finance approval"),
            Some("Processing with Claims Admin")
        );
        assert_eq!(claims.position("Pending Finance Approval"), Some(StatusPosition::Approved));
        assert_eq!(claims.canonical_status("Awaiting Payment"), None);
    }

    #[test]
    fn status_variants_include_aliases_for_filtering() {
        let trf = workflow_for(RequestKind::Trf);

        assert_eq!(
            trf.status_variants("Pending Department Focal"),
            vec!["Pending Department Focal", "Pending Verification"]
        );
        assert_eq!(trf.status_variants("Pending HOD"), vec!["Pending HOD"]);
        assert!(trf.status_variants("Unknown").is_empty());
    }

    #[test]
    fn pending_role_follows_the_chain_into_processing() {
        let visa = workflow_for(RequestKind::Visa);

        assert_eq!(visa.pending_role("Pending Department Focal"), Some(Role::DepartmentFocal));
        assert_eq!(visa.pending_role("Pending HOD"), Some(Role::Hod));
        assert_eq!(visa.pending_role("Processing with Visa Admin"), Some(Role::VisaAdmin));
        assert_eq!(visa.pending_role("Processed"), None);
        assert_eq!(visa.pending_role("Rejected"), None);
    }

    #[test]
    fn accommodation_confirms_instead_of_processing() {
        let accommodation = workflow_for(RequestKind::Accommodation);

        assert_eq!(accommodation.position("Confirmed"), Some(StatusPosition::Processed));
        assert_eq!(accommodation.position("Processed"), None);
        assert!(accommodation.known_statuses().contains(&"Confirmed"));
    }

    #[test]
    fn delete_whitelist_covers_first_stage_and_terminal_failures() {
        let transport = workflow_for(RequestKind::Transport);

        assert!(transport.is_deletable("Pending Verification"));
        assert!(transport.is_deletable("Rejected"));
        assert!(transport.is_deletable("Cancelled"));
        assert!(!transport.is_deletable("Pending Line Manager"));
        assert!(!transport.is_deletable("Processed"));
        assert_eq!(
            transport.deletable_statuses(),
            vec!["Pending Department Focal", "Pending Verification", "Rejected", "Cancelled"]
        );
    }

    #[test]
    fn claims_admin_awaits_processing_statuses() {
        let claims = workflow_for(RequestKind::Claims);

        assert_eq!(
            claims.statuses_awaiting(Role::ClaimsAdmin),
            vec!["Processing with Claims Admin", "Pending Finance Approval"]
        );
        assert_eq!(
            claims.statuses_awaiting(Role::DepartmentFocal),
            vec!["Pending Department Focal", "Pending Verification"]
        );
        assert!(claims.statuses_awaiting(Role::VisaAdmin).is_empty());
    }
}
