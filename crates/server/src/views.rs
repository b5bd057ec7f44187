use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use tripflow_core::domain::payload::RequestPayload;
use tripflow_core::domain::request::{RequestKind, Requestor, ServiceRequest};
use tripflow_core::domain::step::ApprovalStep;
use tripflow_core::domain::user::Role;
use tripflow_core::workflow::{workflow_for, WorkflowStepView};

#[derive(Clone, Debug, Serialize)]
pub struct RequestView {
    pub id: String,
    pub kind: RequestKind,
    pub module: &'static str,
    /// Canonical status name, even for rows written under a legacy name.
    pub status: String,
    pub pending_role: Option<Role>,
    pub requestor: Requestor,
    pub payload: RequestPayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_amount: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&ServiceRequest> for RequestView {
    fn from(request: &ServiceRequest) -> Self {
        let definition = workflow_for(request.kind);
        let status = definition
            .canonical_status(&request.status)
            .map(ToString::to_string)
            .unwrap_or_else(|| request.status.clone());
        let total_amount = match &request.payload {
            RequestPayload::Claims(claim) => Some(claim.total_amount()),
            _ => None,
        };

        Self {
            id: request.id.0.clone(),
            kind: request.kind,
            module: request.kind.label(),
            pending_role: definition.pending_role(&request.status),
            status,
            requestor: request.requestor.clone(),
            payload: request.payload.clone(),
            total_amount,
            created_at: request.created_at,
            updated_at: request.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RequestDetail {
    pub request: RequestView,
    pub workflow: Vec<WorkflowStepView>,
    pub steps: Vec<ApprovalStep>,
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub page_size: u32,
    pub total: i64,
}

#[derive(Debug, Serialize)]
pub struct TransitionResponse {
    pub request: RequestView,
    pub previous_status: String,
    pub step: ApprovalStep,
}
