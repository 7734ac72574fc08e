use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use tracing::error;

use jobsearch_core::DomainError;
use jobsearch_infra::search::SearchError;

pub fn search_error_to_response(err: SearchError) -> axum::response::Response {
    match err {
        SearchError::InvalidRequest(e) => domain_error_to_response(e),
        e if e.is_service_unavailable() => {
            json_error(StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", e.to_string())
        }
        e => {
            // Store and provider internals stay in the logs.
            error!(error = %e, "search failed");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "search failed; see server logs",
            )
        }
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        other => json_error(StatusCode::BAD_REQUEST, "invalid_request", other.to_string()),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use jobsearch_infra::job_source::SourceError;
    use jobsearch_infra::job_store::StoreError;

    use super::*;

    #[test]
    fn validation_maps_to_bad_request() {
        let res = search_error_to_response(SearchError::InvalidRequest(DomainError::validation(
            "results_wanted must be at least 1",
        )));
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn unavailable_and_timeout_map_to_503() {
        let exhausted = SearchError::SourceUnavailable {
            attempts: 3,
            last: SourceError::RateLimited("slow down".into()),
        };
        assert_eq!(
            search_error_to_response(exhausted).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            search_error_to_response(SearchError::TimedOut(Duration::from_secs(1))).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn store_and_permanent_source_failures_are_internal() {
        let store = SearchError::Store(StoreError::Connection("refused".into()));
        assert_eq!(
            search_error_to_response(store).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        let source = SearchError::Source(SourceError::Malformed("not json".into()));
        assert_eq!(
            search_error_to_response(source).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
