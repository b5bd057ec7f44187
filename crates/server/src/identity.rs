//! Caller identity.
//!
//! Authentication happens upstream; the session provider forwards the user id
//! in `X-User-Id` and this service resolves it against `app_user`.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use tripflow_core::domain::user::User;
use tripflow_core::workflow::ActorContext;
use tripflow_core::ServiceRequest;

use crate::error::ApiError;
use crate::state::AppState;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

#[derive(Clone, Debug)]
pub struct Caller {
    pub user: User,
    pub correlation_id: String,
}

impl Caller {
    pub fn actor_for(&self, request: &ServiceRequest) -> ActorContext {
        ActorContext {
            role: self.user.role,
            is_requestor: request.is_owned_by(&self.user.id),
            can_override: self.user.can_override_workflow(),
        }
    }
}

impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let correlation_id = parts
            .headers
            .get(CORRELATION_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty() && value.len() <= 128)
            .map(ToString::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or(ApiError::Unauthenticated)?;

        let user = state
            .users
            .find_by_id(user_id)
            .await
            .map_err(|error| ApiError::from_repository(&correlation_id, error))?
            .ok_or(ApiError::Unauthenticated)?;

        Ok(Self { user, correlation_id })
    }
}
