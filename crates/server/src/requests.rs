use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use tripflow_core::domain::payload::RequestPayload;
use tripflow_core::domain::request::{RequestId, RequestKind, Requestor, ServiceRequest};
use tripflow_core::domain::step::{ApprovalStep, StepOutcome};
use tripflow_core::domain::user::{Role, User};
use tripflow_core::notifications::NotificationEvent;
use tripflow_core::submissions::{SubmissionCheck, SubmissionGuard};
use tripflow_core::workflow::{reconstruct, workflow_for, WorkflowEngine};
use tripflow_db::repositories::RequestFilter;

use crate::documents;
use crate::error::ApiError;
use crate::identity::Caller;
use crate::notify;
use crate::state::AppState;
use crate::views::{Page, RequestDetail, RequestView};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

pub(crate) fn parse_kind(raw: &str) -> Result<RequestKind, ApiError> {
    RequestKind::parse(raw).ok_or_else(|| ApiError::NotFound(format!("unknown request module `{raw}`")))
}

/// Requestors see their own requests; approvers and processors see the
/// requests of modules they take part in.
pub(crate) fn can_view(user: &User, request: &ServiceRequest) -> bool {
    if request.is_owned_by(&user.id) || user.can_view_all_requests() {
        return true;
    }
    let definition = workflow_for(request.kind);
    definition.stages.iter().any(|stage| stage.role == user.role)
        || definition.processing.role == user.role
}

pub(crate) async fn load_request(
    state: &AppState,
    caller: &Caller,
    kind: RequestKind,
    id: &str,
) -> Result<ServiceRequest, ApiError> {
    let request = state
        .requests
        .find_by_id(kind, &RequestId(id.to_string()))
        .await
        .map_err(|error| ApiError::from_repository(&caller.correlation_id, error))?
        .ok_or_else(|| ApiError::NotFound(format!("{} `{id}` was not found", kind.label())))?;

    if !can_view(&caller.user, &request) {
        return Err(ApiError::Forbidden(format!("you may not view {} `{id}`", kind.label())));
    }
    Ok(request)
}

pub(crate) fn page_bounds(query: &ListQuery) -> Result<(u32, u32), ApiError> {
    let page = query.page.unwrap_or(1);
    let page_size = query.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
    if page == 0 {
        return Err(ApiError::validation("page", "must be at least 1"));
    }
    if page_size == 0 || page_size > MAX_PAGE_SIZE {
        return Err(ApiError::validation(
            "page_size",
            format!("must be between 1 and {MAX_PAGE_SIZE}"),
        ));
    }
    Ok((page, page_size))
}

pub async fn create(
    State(state): State<AppState>,
    caller: Caller,
    Path(kind): Path<String>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<(StatusCode, Json<RequestView>), ApiError> {
    let kind = parse_kind(&kind)?;
    let Json(body) = body?;
    let payload = RequestPayload::from_json(kind, body.clone())?;

    let fingerprint = SubmissionGuard::fingerprint(&caller.user.id, kind, &body);
    if let SubmissionCheck::Duplicate { retry_after } = state.submissions.check(&fingerprint) {
        info!(
            event_name = "request.duplicate_submission",
            correlation_id = %caller.correlation_id,
            user_id = %caller.user.id,
            kind = %kind,
            "duplicate submission rejected"
        );
        return Err(ApiError::DuplicateSubmission {
            retry_after_secs: retry_after.as_secs().max(1),
        });
    }

    let now = Utc::now();
    let engine = WorkflowEngine::for_kind(kind);
    let request = ServiceRequest {
        id: RequestId::generate(kind, now),
        kind,
        requestor: Requestor {
            id: caller.user.id.clone(),
            name: caller.user.name.clone(),
            email: caller.user.email.clone(),
            department: caller.user.department.clone(),
        },
        status: engine.initial_status().to_string(),
        payload,
        created_at: now,
        updated_at: now,
    };
    let step = ApprovalStep::new(
        request.id.clone(),
        kind,
        Role::Requestor,
        caller.user.id.clone(),
        caller.user.name.clone(),
        StepOutcome::Submitted,
        request.status.clone(),
        None,
        now,
    );

    if let Err(error) = state.requests.insert_submission(&request, &step).await {
        state.submissions.forget(&fingerprint);
        return Err(ApiError::from_repository(&caller.correlation_id, error));
    }

    info!(
        event_name = "request.submitted",
        correlation_id = %caller.correlation_id,
        request_id = %request.id,
        kind = %kind,
        user_id = %caller.user.id,
        status = %request.status,
        "request submitted"
    );

    notify::dispatch(
        state.notifier.clone(),
        NotificationEvent::submitted(kind, request.id.clone(), request.requestor.clone(), request.status.clone()),
        caller.correlation_id.clone(),
    );

    Ok((StatusCode::CREATED, Json(RequestView::from(&request))))
}

pub async fn list(
    State(state): State<AppState>,
    caller: Caller,
    Path(kind): Path<String>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<Page<RequestView>>, ApiError> {
    let kind = parse_kind(&kind)?;
    let Query(query) = query?;
    let (page, page_size) = page_bounds(&query)?;

    let statuses = match query.status.as_deref().map(str::trim).filter(|value| !value.is_empty()) {
        Some(status) => {
            let variants = workflow_for(kind).status_variants(status);
            if variants.is_empty() {
                return Err(ApiError::validation(
                    "status",
                    format!("`{status}` is not a {} status", kind.label()),
                ));
            }
            variants.into_iter().map(ToString::to_string).collect()
        }
        None => Vec::new(),
    };

    let filter = RequestFilter {
        kind: Some(kind),
        statuses,
        requestor_id: (!caller.user.can_view_all_requests()).then(|| caller.user.id.clone()),
        limit: page_size,
        offset: (page - 1).saturating_mul(page_size),
        ..RequestFilter::default()
    };

    let items = state
        .requests
        .list(&filter)
        .await
        .map_err(|error| ApiError::from_repository(&caller.correlation_id, error))?;
    let total = state
        .requests
        .count(&filter)
        .await
        .map_err(|error| ApiError::from_repository(&caller.correlation_id, error))?;

    Ok(Json(Page { items: items.iter().map(RequestView::from).collect(), page, page_size, total }))
}

pub async fn detail(
    State(state): State<AppState>,
    caller: Caller,
    Path((kind, id)): Path<(String, String)>,
) -> Result<Json<RequestDetail>, ApiError> {
    let kind = parse_kind(&kind)?;
    let request = load_request(&state, &caller, kind, &id).await?;
    let steps = state
        .requests
        .list_steps(&request.id)
        .await
        .map_err(|error| ApiError::from_repository(&caller.correlation_id, error))?;

    let workflow = reconstruct(workflow_for(kind), &request.status, &steps);
    Ok(Json(RequestDetail { request: RequestView::from(&request), workflow, steps }))
}

pub async fn update(
    State(state): State<AppState>,
    caller: Caller,
    Path((kind, id)): Path<(String, String)>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Json<RequestView>, ApiError> {
    let kind = parse_kind(&kind)?;
    let Json(body) = body?;
    let mut request = load_request(&state, &caller, kind, &id).await?;

    if !request.is_owned_by(&caller.user.id) {
        return Err(ApiError::Forbidden("only the requestor may edit a request".to_string()));
    }
    let definition = workflow_for(kind);
    if !definition.is_editable(&request.status) {
        return Err(ApiError::InvalidTransition(format!(
            "a request in status `{}` can no longer be edited (only while `{}`)",
            request.status,
            definition.initial_status()
        )));
    }

    request.payload = RequestPayload::from_json(kind, body)?;
    request.updated_at = Utc::now();
    let expected_status = request.status.clone();
    state
        .requests
        .update_payload(&request, &expected_status)
        .await
        .map_err(|error| ApiError::from_repository(&caller.correlation_id, error))?;

    info!(
        event_name = "request.updated",
        correlation_id = %caller.correlation_id,
        request_id = %request.id,
        kind = %kind,
        "request payload updated"
    );

    Ok(Json(RequestView::from(&request)))
}

pub async fn remove(
    State(state): State<AppState>,
    caller: Caller,
    Path((kind, id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let kind = parse_kind(&kind)?;
    let request = load_request(&state, &caller, kind, &id).await?;

    if !request.is_owned_by(&caller.user.id) && !caller.user.can_override_workflow() {
        return Err(ApiError::Forbidden("only the requestor may delete a request".to_string()));
    }
    let definition = workflow_for(kind);
    if !definition.is_deletable(&request.status) {
        return Err(ApiError::InvalidTransition(format!(
            "a request in status `{}` cannot be deleted (allowed: {})",
            request.status,
            definition.deletable_statuses().join(", ")
        )));
    }

    state
        .requests
        .delete(&request.id, &request.status)
        .await
        .map_err(|error| ApiError::from_repository(&caller.correlation_id, error))?;
    if kind == RequestKind::Visa {
        documents::remove_request_uploads(&state, &request.id).await;
    }

    info!(
        event_name = "request.deleted",
        correlation_id = %caller.correlation_id,
        request_id = %request.id,
        kind = %kind,
        user_id = %caller.user.id,
        "request deleted"
    );

    Ok(StatusCode::NO_CONTENT)
}
