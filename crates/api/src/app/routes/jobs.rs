use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use tracing::info;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub async fn search_jobs(
    Extension(services): Extension<Arc<AppServices>>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> axum::response::Response {
    let Query(pairs) = match query {
        Ok(q) => q,
        Err(rejection) => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "validation_error",
                rejection.body_text(),
            );
        }
    };

    let request = match dto::JobSearchParams::from_pairs(pairs).and_then(|p| p.into_request()) {
        Ok(r) => r,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.search(request).await {
        Ok(result) => {
            info!(
                total = result.source.total,
                degraded = result.is_degraded(),
                "jobs search served"
            );
            (StatusCode::OK, Json(result)).into_response()
        }
        Err(e) => errors::search_error_to_response(e),
    }
}
