use axum::{routing::get, Router};

pub mod jobs;
pub mod system;

/// Router for the search endpoints.
pub fn router() -> Router {
    Router::new().route("/jobs", get(jobs::search_jobs))
}
