//! One search request end to end: plan, top up, compose.

use std::time::Duration;

use chrono::Utc;
use tracing::{info, instrument, warn};

use jobsearch_core::{SearchRequest, SearchResult};

use crate::job_source::JobSource;
use crate::job_store::{JobStore, JobStorePool};

use super::composer::compose;
use super::error::SearchError;
use super::planner;
use super::reconcile::ReconcileEngine;

/// Limits applied to every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchSettings {
    pub request_timeout: Duration,
    pub max_results_wanted: u32,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(120),
            max_results_wanted: 100,
        }
    }
}

/// Orchestrates a search over a store pool and an external source.
#[derive(Debug)]
pub struct SearchService<P, Src> {
    pool: P,
    engine: ReconcileEngine<Src>,
    settings: SearchSettings,
}

impl<P, Src> SearchService<P, Src>
where
    P: JobStorePool,
    Src: JobSource,
{
    pub fn new(pool: P, engine: ReconcileEngine<Src>, settings: SearchSettings) -> Self {
        Self {
            pool,
            engine,
            settings,
        }
    }

    pub fn settings(&self) -> SearchSettings {
        self.settings
    }

    /// Run a search. Validation happens before any store or source access;
    /// everything after it is bounded by the request timeout.
    #[instrument(
        skip(self, request),
        fields(search_term = %request.search_term, results_wanted = request.results_wanted),
        err
    )]
    pub async fn search(&self, request: SearchRequest) -> Result<SearchResult, SearchError> {
        request.validate(self.settings.max_results_wanted)?;

        let timeout = self.settings.request_timeout;
        match tokio::time::timeout(timeout, self.run(&request)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout_ms = timeout.as_millis() as u64, "search timed out");
                Err(SearchError::TimedOut(timeout))
            }
        }
    }

    async fn run(&self, request: &SearchRequest) -> Result<SearchResult, SearchError> {
        // Released back to the pool when this future completes or is dropped.
        let mut session = self.pool.acquire().await?;

        let planned = planner::plan(&mut session, request, Utc::now()).await?;
        if planned.additional_needed == 0 {
            info!(matched = planned.matches.len(), "served from store");
            return Ok(compose(planned.matches, Vec::new(), request.results_wanted, None));
        }

        let fetched = self
            .engine
            .fetch_and_reconcile(
                &mut session,
                request,
                planned.additional_needed,
                planned.matches.len(),
            )
            .await;

        match fetched {
            Ok(reconciled) => {
                let result = compose(
                    planned.matches,
                    reconciled.records,
                    request.results_wanted,
                    None,
                );
                info!(
                    database = result.source.database,
                    scraped = result.source.scraped,
                    "search complete"
                );
                Ok(result)
            }
            Err(err @ SearchError::SourceUnavailable { .. }) if !planned.matches.is_empty() => {
                warn!(error = %err, stored = planned.matches.len(), "serving stored results only");
                let warning = format!("Showing stored results only: {err}");
                Ok(compose(
                    planned.matches,
                    Vec::new(),
                    request.results_wanted,
                    Some(warning),
                ))
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration as ChronoDuration;
    use serde_json::json;

    use jobsearch_core::{JobPosting, NewJob, ProviderId, RawJob};

    use crate::job_source::{ScriptedJobSource, SourceError};
    use crate::job_store::InMemoryJobStore;
    use crate::retry::RetryPolicy;

    use super::*;

    fn fast_retry() -> RetryPolicy {
        RetryPolicy::exponential(3, Duration::from_millis(1), Duration::from_millis(2))
    }

    fn service(
        store: InMemoryJobStore,
        source: Arc<ScriptedJobSource>,
    ) -> SearchService<InMemoryJobStore, Arc<ScriptedJobSource>> {
        SearchService::new(
            store,
            ReconcileEngine::new(source, fast_retry()),
            SearchSettings::default(),
        )
    }

    fn stored_rust_job(id: &str) -> NewJob {
        NewJob::new(
            ProviderId::new(id).unwrap(),
            JobPosting {
                title: Some("Rust Engineer".to_string()),
                date_posted: Some(Utc::now() - ChronoDuration::hours(1)),
                ..JobPosting::default()
            },
        )
    }

    fn fetched(id: &str) -> RawJob {
        RawJob::from_value(json!({"id": id, "title": "Rust Engineer"})).unwrap()
    }

    #[tokio::test]
    async fn invalid_requests_touch_nothing() {
        let source = Arc::new(ScriptedJobSource::new());
        let svc = service(InMemoryJobStore::new(), source.clone());

        let err = svc
            .search(SearchRequest::new("rust").with_results_wanted(0))
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::InvalidRequest(_)));
        assert_eq!(source.call_count(), 0);
    }

    #[tokio::test]
    async fn degraded_result_when_source_is_exhausted() {
        let source = Arc::new(
            ScriptedJobSource::new()
                .fail(SourceError::Unreachable("1".into()))
                .fail(SourceError::Unreachable("2".into()))
                .fail(SourceError::Unreachable("3".into())),
        );
        let store = InMemoryJobStore::with_jobs([stored_rust_job("a"), stored_rust_job("b")]);
        let svc = service(store, source.clone());

        let result = svc
            .search(SearchRequest::new("rust").with_results_wanted(5))
            .await
            .unwrap();
        assert!(result.is_degraded());
        assert_eq!(result.source.database, 2);
        assert_eq!(result.source.scraped, 0);
        assert_eq!(source.call_count(), 3);
    }

    #[tokio::test]
    async fn unavailable_when_source_is_exhausted_and_store_is_empty() {
        let source = Arc::new(
            ScriptedJobSource::new()
                .fail(SourceError::RateLimited("1".into()))
                .fail(SourceError::RateLimited("2".into()))
                .fail(SourceError::RateLimited("3".into())),
        );
        let svc = service(InMemoryJobStore::new(), source);

        let err = svc.search(SearchRequest::new("rust")).await.unwrap_err();
        assert!(err.is_service_unavailable());
    }

    #[tokio::test]
    async fn permanent_source_failure_is_not_degraded() {
        let source = Arc::new(ScriptedJobSource::new().fail(SourceError::Malformed("x".into())));
        let store = InMemoryJobStore::with_jobs([stored_rust_job("a")]);
        let svc = service(store, source);

        let err = svc.search(SearchRequest::new("rust")).await.unwrap_err();
        assert!(matches!(err, SearchError::Source(_)));
        assert!(!err.is_service_unavailable());
    }

    #[tokio::test]
    async fn huge_recency_window_is_served() {
        let source = Arc::new(ScriptedJobSource::new().respond(vec![fetched("b")]));
        let store = InMemoryJobStore::with_jobs([stored_rust_job("a")]);
        let svc = service(store, source);

        let result = svc
            .search(
                SearchRequest::new("rust")
                    .with_results_wanted(2)
                    .with_hours_old(3_000_000_000),
            )
            .await
            .unwrap();
        assert_eq!(result.source.database, 1);
        assert_eq!(result.source.scraped, 1);
    }

    #[tokio::test]
    async fn request_timeout_cancels_the_search() {
        let source = Arc::new(
            ScriptedJobSource::new()
                .with_latency(Duration::from_millis(200))
                .respond(vec![fetched("a")]),
        );
        let store = InMemoryJobStore::new();
        let svc = SearchService::new(
            store.clone(),
            ReconcileEngine::new(source, fast_retry()),
            SearchSettings {
                request_timeout: Duration::from_millis(20),
                max_results_wanted: 100,
            },
        );

        let err = svc.search(SearchRequest::new("rust")).await.unwrap_err();
        assert!(matches!(err, SearchError::TimedOut(_)));
        assert!(err.is_service_unavailable());
        assert!(store.is_empty());
    }
}
