use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use crate::documents::MULTIPART_OVERHEAD_BYTES;
use crate::state::AppState;
use crate::{actions, dashboard, documents, health, requests};

pub fn router(state: AppState) -> Router {
    let upload_limit =
        usize::try_from(state.uploads.max_file_bytes.saturating_add(MULTIPART_OVERHEAD_BYTES))
            .unwrap_or(usize::MAX);

    let api = Router::new()
        .route("/api/me", get(dashboard::me))
        .route("/api/dashboard/summary", get(dashboard::summary))
        .route("/api/approvals/pending", get(dashboard::pending_approvals))
        .route("/api/reports/requests", get(dashboard::report))
        .route("/api/{kind}", get(requests::list).post(requests::create))
        .route(
            "/api/{kind}/{id}",
            get(requests::detail).put(requests::update).delete(requests::remove),
        )
        .route("/api/{kind}/{id}/action", post(actions::act))
        .route("/api/{kind}/{id}/process", post(actions::process))
        .route("/api/{kind}/{id}/cancel", post(actions::cancel))
        .route(
            "/api/{kind}/{id}/documents",
            get(documents::list)
                .post(documents::upload)
                .layer(DefaultBodyLimit::max(upload_limit)),
        )
        .with_state(state.clone());

    api.merge(health::router(state.db_pool))
}
