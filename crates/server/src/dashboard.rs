use std::collections::BTreeMap;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tripflow_core::domain::request::RequestKind;
use tripflow_core::domain::user::{Role, PERMISSION_VIEW_REPORTS};
use tripflow_core::workflow::workflow_for;
use tripflow_db::repositories::RequestFilter;

use crate::error::ApiError;
use crate::identity::Caller;
use crate::requests::{page_bounds, parse_kind, ListQuery, MAX_PAGE_SIZE};
use crate::state::AppState;
use crate::views::{Page, RequestView};

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub department: String,
    pub role: Role,
    pub role_label: &'static str,
    pub permissions: Vec<String>,
}

pub async fn me(caller: Caller) -> Json<MeResponse> {
    let user = caller.user;
    Json(MeResponse {
        role_label: user.role.label(),
        permissions: user.permissions.into_iter().collect(),
        id: user.id,
        name: user.name,
        email: user.email,
        department: user.department,
        role: user.role,
    })
}

#[derive(Debug, Serialize)]
pub struct ModuleSummary {
    pub kind: RequestKind,
    pub module: &'static str,
    pub total: i64,
    pub statuses: BTreeMap<String, i64>,
}

#[derive(Debug, Serialize)]
pub struct DashboardSummary {
    pub scope: &'static str,
    pub modules: Vec<ModuleSummary>,
}

/// Request counts per module and canonical status.
pub async fn summary(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<DashboardSummary>, ApiError> {
    let view_all = caller.user.can_view_all_requests();
    let requestor = (!view_all).then_some(caller.user.id.as_str());
    let counts = state
        .requests
        .status_counts(requestor)
        .await
        .map_err(|error| ApiError::from_repository(&caller.correlation_id, error))?;

    let mut modules: Vec<ModuleSummary> = RequestKind::ALL
        .iter()
        .map(|kind| ModuleSummary { kind: *kind, module: kind.label(), total: 0, statuses: BTreeMap::new() })
        .collect();

    for row in counts {
        let Some(module) = modules.iter_mut().find(|module| module.kind == row.kind) else {
            continue;
        };
        let status = workflow_for(row.kind)
            .canonical_status(&row.status)
            .map(ToString::to_string)
            .unwrap_or(row.status);
        *module.statuses.entry(status).or_insert(0) += row.count;
        module.total += row.count;
    }

    Ok(Json(DashboardSummary { scope: if view_all { "all" } else { "own" }, modules }))
}

/// Requests currently waiting on the caller's role, across every module.
pub async fn pending_approvals(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<Vec<RequestView>>, ApiError> {
    let mut pending = Vec::new();
    for kind in RequestKind::ALL {
        let statuses = workflow_for(kind).statuses_awaiting(caller.user.role);
        if statuses.is_empty() {
            continue;
        }
        let filter = RequestFilter {
            kind: Some(kind),
            statuses: statuses.into_iter().map(ToString::to_string).collect(),
            limit: MAX_PAGE_SIZE,
            ..RequestFilter::default()
        };
        let rows = state
            .requests
            .list(&filter)
            .await
            .map_err(|error| ApiError::from_repository(&caller.correlation_id, error))?;
        pending.extend(rows.iter().map(RequestView::from));
    }
    pending.sort_by(|left, right| left.created_at.cmp(&right.created_at).then_with(|| left.id.cmp(&right.id)));
    Ok(Json(pending))
}

#[derive(Debug, Default, Deserialize)]
pub struct ReportQuery {
    pub kind: Option<String>,
    pub status: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct ReportRow {
    pub id: String,
    pub module: &'static str,
    pub requestor_name: String,
    pub department: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_amount: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<RequestView> for ReportRow {
    fn from(view: RequestView) -> Self {
        Self {
            id: view.id,
            module: view.module,
            requestor_name: view.requestor.name,
            department: view.requestor.department,
            status: view.status,
            total_amount: view.total_amount,
            created_at: view.created_at,
            updated_at: view.updated_at,
        }
    }
}

pub async fn report(
    State(state): State<AppState>,
    caller: Caller,
    query: Result<Query<ReportQuery>, QueryRejection>,
) -> Result<Json<Page<ReportRow>>, ApiError> {
    if !caller.user.has_permission(PERMISSION_VIEW_REPORTS) {
        return Err(ApiError::Forbidden(format!("`{PERMISSION_VIEW_REPORTS}` is required")));
    }
    let Query(query) = query?;
    let (page, page_size) =
        page_bounds(&ListQuery { status: None, page: query.page, page_size: query.page_size })?;

    let kind = match query.kind.as_deref().map(str::trim).filter(|value| !value.is_empty()) {
        Some(raw) => Some(parse_kind(raw).map_err(|_| {
            ApiError::validation("kind", format!("`{raw}` is not a request module"))
        })?),
        None => None,
    };

    let statuses = match query.status.as_deref().map(str::trim).filter(|value| !value.is_empty()) {
        Some(status) => {
            let kinds: Vec<RequestKind> = kind.map_or_else(|| RequestKind::ALL.to_vec(), |kind| vec![kind]);
            let mut variants: Vec<String> = kinds
                .into_iter()
                .flat_map(|kind| workflow_for(kind).status_variants(status))
                .map(ToString::to_string)
                .collect();
            variants.sort();
            variants.dedup();
            if variants.is_empty() {
                return Err(ApiError::validation("status", format!("`{status}` is not a known status")));
            }
            variants
        }
        None => Vec::new(),
    };

    if let (Some(from), Some(to)) = (query.from, query.to) {
        if from > to {
            return Err(ApiError::validation("from", "must not be after `to`"));
        }
    }

    let filter = RequestFilter {
        kind,
        statuses,
        requestor_id: None,
        created_from: query.from.map(|date| date.and_time(NaiveTime::MIN).and_utc()),
        created_to: query.to.and_then(|date| date.and_hms_micro_opt(23, 59, 59, 999_999)).map(|value| value.and_utc()),
        limit: page_size,
        offset: (page - 1).saturating_mul(page_size),
    };

    let rows = state
        .requests
        .list(&filter)
        .await
        .map_err(|error| ApiError::from_repository(&caller.correlation_id, error))?;
    let total = state
        .requests
        .count(&filter)
        .await
        .map_err(|error| ApiError::from_repository(&caller.correlation_id, error))?;

    Ok(Json(Page {
        items: rows.iter().map(RequestView::from).map(ReportRow::from).collect(),
        page,
        page_size,
        total,
    }))
}
