use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use tripflow_core::domain::step::ApprovalStep;
use tripflow_core::notifications::NotificationEvent;
use tripflow_core::workflow::{WorkflowAction, WorkflowEngine};

use crate::error::ApiError;
use crate::identity::Caller;
use crate::notify;
use crate::requests::{load_request, parse_kind};
use crate::state::AppState;
use crate::views::{RequestView, TransitionResponse};

pub const MAX_COMMENT_CHARS: usize = 2_000;

#[derive(Debug, Deserialize)]
pub struct ActionBody {
    pub action: String,
    #[serde(default)]
    pub comments: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CommentBody {
    #[serde(default)]
    pub comments: Option<String>,
}

/// Approve, verify or reject at the current approval stage.
pub async fn act(
    State(state): State<AppState>,
    caller: Caller,
    Path((kind, id)): Path<(String, String)>,
    body: Result<Json<ActionBody>, JsonRejection>,
) -> Result<Json<TransitionResponse>, ApiError> {
    let Json(body) = body?;
    let action = WorkflowAction::parse(&body.action).ok_or_else(|| {
        ApiError::validation("action", format!("`{}` is not a workflow action", body.action))
    })?;
    transition(state, caller, &kind, &id, action, body.comments).await
}

pub async fn process(
    State(state): State<AppState>,
    caller: Caller,
    Path((kind, id)): Path<(String, String)>,
    body: Result<Option<Json<CommentBody>>, JsonRejection>,
) -> Result<Json<TransitionResponse>, ApiError> {
    let comments = body?.and_then(|Json(body)| body.comments);
    transition(state, caller, &kind, &id, WorkflowAction::Process, comments).await
}

pub async fn cancel(
    State(state): State<AppState>,
    caller: Caller,
    Path((kind, id)): Path<(String, String)>,
    body: Result<Option<Json<CommentBody>>, JsonRejection>,
) -> Result<Json<TransitionResponse>, ApiError> {
    let comments = body?.and_then(|Json(body)| body.comments);
    transition(state, caller, &kind, &id, WorkflowAction::Cancel, comments).await
}

async fn transition(
    state: AppState,
    caller: Caller,
    kind: &str,
    id: &str,
    action: WorkflowAction,
    comments: Option<String>,
) -> Result<Json<TransitionResponse>, ApiError> {
    let kind = parse_kind(kind)?;
    if comments.as_ref().is_some_and(|text| text.chars().count() > MAX_COMMENT_CHARS) {
        return Err(ApiError::validation(
            "comments",
            format!("must be at most {MAX_COMMENT_CHARS} characters"),
        ));
    }

    let mut request = load_request(&state, &caller, kind, id).await?;
    let engine = WorkflowEngine::for_kind(kind);
    let transition = engine.apply(&request.status, action, &caller.actor_for(&request))?;

    let now = Utc::now();
    let step = ApprovalStep::new(
        request.id.clone(),
        kind,
        transition.acting_role,
        caller.user.id.clone(),
        caller.user.name.clone(),
        transition.outcome,
        transition.to,
        comments,
        now,
    );

    state
        .requests
        .apply_transition(&request.id, &transition.from, &step)
        .await
        .map_err(|error| ApiError::from_repository(&caller.correlation_id, error))?;

    info!(
        event_name = "request.transitioned",
        correlation_id = %caller.correlation_id,
        request_id = %request.id,
        kind = %kind,
        action = %action,
        acting_role = %transition.acting_role,
        user_id = %caller.user.id,
        from_status = %transition.from,
        to_status = transition.to,
        "workflow transition applied"
    );

    request.status = transition.to.to_string();
    request.updated_at = now;

    notify::dispatch(
        state.notifier.clone(),
        NotificationEvent::transitioned(
            kind,
            request.id.clone(),
            request.requestor.clone(),
            transition.from.clone(),
            transition.to,
            action,
            caller.user.name.clone(),
            step.comments.clone(),
        ),
        caller.correlation_id.clone(),
    );

    Ok(Json(TransitionResponse {
        request: RequestView::from(&request),
        previous_status: transition.from,
        step,
    }))
}
