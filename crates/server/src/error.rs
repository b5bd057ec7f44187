use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use tripflow_core::errors::{DomainError, FieldError};
use tripflow_core::workflow::WorkflowError;
use tripflow_db::repositories::RepositoryError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request validation failed")]
    Validation(Vec<FieldError>),
    #[error("{0}")]
    InvalidTransition(String),
    #[error("a valid X-User-Id header is required")]
    Unauthenticated,
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("an identical submission was received recently; retry in {retry_after_secs}s")]
    DuplicateSubmission { retry_after_secs: u64 },
    #[error("an internal error occurred")]
    Internal { correlation_id: String },
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<FieldError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl ApiError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        Self::Validation(vec![FieldError::new(field, message)])
    }

    /// Logs the underlying failure and hides it from the client.
    pub fn internal(correlation_id: &str, context: &'static str, source: impl std::fmt::Display) -> Self {
        error!(
            event_name = "api.internal_error",
            correlation_id = %correlation_id,
            context,
            error = %source,
            "request failed with an internal error"
        );
        Self::Internal { correlation_id: correlation_id.to_string() }
    }

    pub fn from_repository(correlation_id: &str, error: RepositoryError) -> Self {
        match error {
            RepositoryError::NotFound(id) => Self::NotFound(format!("request `{id}` was not found")),
            RepositoryError::Conflict { id, actual, .. } => Self::Conflict(format!(
                "request `{id}` was changed by someone else (now `{actual}`); reload and retry"
            )),
            other => Self::internal(correlation_id, "repository", other),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::InvalidTransition(_) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::DuplicateSubmission { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_failed",
            Self::InvalidTransition(_) => "invalid_transition",
            Self::Unauthenticated => "unauthenticated",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::DuplicateSubmission { .. } => "duplicate_submission",
            Self::Internal { .. } => "internal_error",
        }
    }
}

impl From<WorkflowError> for ApiError {
    fn from(error: WorkflowError) -> Self {
        match error {
            WorkflowError::NotPermitted { .. } => Self::Forbidden(error.to_string()),
            WorkflowError::InvalidTransition { .. } | WorkflowError::UnknownStatus { .. } => {
                Self::InvalidTransition(error.to_string())
            }
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(error: DomainError) -> Self {
        match error {
            DomainError::Validation(fields) => Self::Validation(fields),
            DomainError::Workflow(workflow) => workflow.into(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::validation("body", rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::validation("query", rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let retry_after = match &self {
            Self::DuplicateSubmission { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        };
        let body = ErrorBody {
            error: self.to_string(),
            code: self.code(),
            correlation_id: match &self {
                Self::Internal { correlation_id } => Some(correlation_id.clone()),
                _ => None,
            },
            details: match self {
                Self::Validation(fields) => fields,
                _ => Vec::new(),
            },
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(seconds) = retry_after {
            if let Ok(value) = HeaderValue::from_str(&seconds.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{header, StatusCode};
    use axum::response::IntoResponse;

    use tripflow_core::domain::user::Role;
    use tripflow_core::errors::FieldError;
    use tripflow_core::workflow::{WorkflowAction, WorkflowError};
    use tripflow_db::repositories::RepositoryError;

    use super::ApiError;

    #[test]
    fn workflow_errors_map_to_400_and_403() {
        let invalid: ApiError = WorkflowError::InvalidTransition {
            status: "Approved".to_string(),
            action: WorkflowAction::Approve,
        }
        .into();
        assert_eq!(invalid.status_code(), StatusCode::BAD_REQUEST);
        assert!(invalid.to_string().contains("approve"));
        assert!(invalid.to_string().contains("Approved"));

        let forbidden: ApiError = WorkflowError::NotPermitted {
            status: "Pending HOD".to_string(),
            action: WorkflowAction::Approve,
            actor_role: Role::LineManager,
            required_role: Role::Hod,
        }
        .into();
        assert_eq!(forbidden.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn repository_conflict_maps_to_409_and_database_errors_are_hidden() {
        let conflict = ApiError::from_repository(
            "corr-1",
            RepositoryError::Conflict {
                id: "TSR-1".to_string(),
                expected: "Pending HOD".to_string(),
                actual: "Approved".to_string(),
            },
        );
        assert_eq!(conflict.status_code(), StatusCode::CONFLICT);

        let hidden = ApiError::from_repository(
            "corr-2",
            RepositoryError::Decode("column `secret_column` is broken".to_string()),
        );
        assert_eq!(hidden.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!hidden.to_string().contains("secret_column"));
    }

    #[test]
    fn duplicate_submission_sets_retry_after() {
        let response = ApiError::DuplicateSubmission { retry_after_secs: 12 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.headers().get(header::RETRY_AFTER).and_then(|value| value.to_str().ok()),
            Some("12")
        );
    }

    #[test]
    fn validation_response_is_400() {
        let response =
            ApiError::Validation(vec![FieldError::new("purpose", "is required")]).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
