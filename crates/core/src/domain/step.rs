use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::request::{RequestId, RequestKind};
use crate::domain::user::Role;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepOutcome {
    Submitted,
    Approved,
    Verified,
    Rejected,
    Processed,
    Cancelled,
}

impl StepOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "Submitted",
            Self::Approved => "Approved",
            Self::Verified => "Verified",
            Self::Rejected => "Rejected",
            Self::Processed => "Processed",
            Self::Cancelled => "Cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "submitted" => Some(Self::Submitted),
            "approved" => Some(Self::Approved),
            "verified" => Some(Self::Verified),
            "rejected" => Some(Self::Rejected),
            "processed" => Some(Self::Processed),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Outcomes that move a request forward through an approval stage.
    pub fn is_forward_approval(&self) -> bool {
        matches!(self, Self::Approved | Self::Verified)
    }
}

/// One append-only audit row in a request's approval chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalStep {
    pub id: String,
    pub request_id: RequestId,
    pub kind: RequestKind,
    pub role: Role,
    pub actor_id: String,
    pub actor_name: String,
    pub outcome: StepOutcome,
    /// Request status after this step was applied.
    pub request_status: String,
    pub comments: Option<String>,
    pub step_date: DateTime<Utc>,
}

impl ApprovalStep {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        request_id: RequestId,
        kind: RequestKind,
        role: Role,
        actor_id: impl Into<String>,
        actor_name: impl Into<String>,
        outcome: StepOutcome,
        request_status: impl Into<String>,
        comments: Option<String>,
        step_date: DateTime<Utc>,
    ) -> Self {
        Self {
            id: format!("STEP-{}", Uuid::new_v4().simple()),
            request_id,
            kind,
            role,
            actor_id: actor_id.into(),
            actor_name: actor_name.into(),
            outcome,
            request_status: request_status.into(),
            comments: comments.filter(|value| !value.trim().is_empty()),
            step_date,
        }
    }
}
