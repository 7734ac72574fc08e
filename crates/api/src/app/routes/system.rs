use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::app::services::AppServices;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// Which store backend and limits this process runs with.
pub async fn info(Extension(services): Extension<Arc<AppServices>>) -> impl IntoResponse {
    let settings = services.settings();
    Json(json!({
        "store": services.backend(),
        "max_results_wanted": settings.max_results_wanted,
        "request_timeout_secs": settings.request_timeout.as_secs(),
    }))
}
