use std::sync::Arc;
use std::time::Duration;

use axum::{routing::post, Json, Router};
use chrono::Utc;
use reqwest::StatusCode;
use serde_json::{json, Value};

use jobsearch_api::app::services::{AppServices, SharedJobSource};
use jobsearch_core::{JobPosting, NewJob, ProviderId, RawJob};
use jobsearch_infra::{
    job_source::{HttpJobSource, ScriptedJobSource, SourceError},
    job_store::InMemoryJobStore,
    retry::RetryPolicy,
    search::SearchSettings,
};

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(services: AppServices) -> Self {
        // Same router as prod, bound to an ephemeral port.
        let app = jobsearch_api::app::build_app(Arc::new(services), "http://localhost:3000");
        Self::serve(app).await
    }

    async fn serve(app: Router) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy::exponential(3, Duration::from_millis(1), Duration::from_millis(2))
}

fn services(store: InMemoryJobStore, source: SharedJobSource) -> AppServices {
    AppServices::in_memory(store, source, fast_retry(), SearchSettings::default())
}

fn stored(id: &str) -> NewJob {
    NewJob::new(
        ProviderId::new(id).unwrap(),
        JobPosting {
            title: Some("Rust Engineer".to_string()),
            company: Some("Ferrous".to_string()),
            date_posted: Some(Utc::now()),
            ..JobPosting::default()
        },
    )
}

fn provider_record(id: &str) -> Value {
    json!({
        "id": id,
        "site": "indeed",
        "title": "Rust Engineer",
        "company": "Ferrous",
        "date_posted": Utc::now().to_rfc3339(),
        "min_amount": 100000.0,
        "max_amount": "NaN",
    })
}

fn scraped(id: &str) -> RawJob {
    RawJob::from_value(provider_record(id)).unwrap()
}

async fn get_json(client: &reqwest::Client, url: String) -> (StatusCode, Value) {
    let res = client.get(url).send().await.unwrap();
    let status = res.status();
    (status, res.json().await.unwrap())
}

#[tokio::test]
async fn health_is_ok() {
    let server = TestServer::spawn(services(
        InMemoryJobStore::new(),
        Arc::new(ScriptedJobSource::new()),
    ))
    .await;

    let res = reqwest::get(format!("{}/health", server.base_url)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let (status, body) = get_json(&reqwest::Client::new(), format!("{}/info", server.base_url)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["store"], "in_memory");
    assert_eq!(body["max_results_wanted"], 100);
}

#[tokio::test]
async fn invalid_queries_are_rejected_with_400() {
    let source = Arc::new(ScriptedJobSource::new());
    let server = TestServer::spawn(services(InMemoryJobStore::new(), source.clone())).await;
    let client = reqwest::Client::new();

    for query in [
        "",
        "search_term=%20%20",
        "search_term=rust&results_wanted=0",
        "search_term=rust&results_wanted=101",
        "search_term=rust&results_wanted=lots",
        "search_term=rust&site_name=,",
    ] {
        let (status, body) = get_json(&client, format!("{}/jobs?{}", server.base_url, query)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "query {query:?}");
        assert_eq!(body["error"], "validation_error", "query {query:?}");
        assert!(body["message"].is_string());
    }

    assert_eq!(source.call_count(), 0);
}

#[tokio::test]
async fn store_shortfall_is_fetched_and_persisted() {
    let store = InMemoryJobStore::with_jobs([stored("db-1")]);
    let source = Arc::new(
        ScriptedJobSource::new().respond(vec![scraped("db-1"), scraped("new-1"), scraped("new-2")]),
    );
    let server = TestServer::spawn(services(store.clone(), source.clone())).await;
    let client = reqwest::Client::new();

    let (status, body) = get_json(
        &client,
        format!("{}/jobs?search_term=rust&results_wanted=3&site_name=indeed", server.base_url),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source"], json!({"database": 1, "scraped": 2, "total": 3}));
    assert!(body.get("warning").is_none());

    let ids: Vec<&str> = body["jobs"]
        .as_array()
        .unwrap()
        .iter()
        .map(|j| j["job_id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["db-1", "new-1", "new-2"]);
    assert!(body["jobs"][1]["max_amount"].is_null());

    let call = &source.calls()[0];
    assert_eq!(call.site_name, vec!["indeed".to_string()]);
    assert_eq!(call.offset, 1);
    assert_eq!(store.len(), 3);

    // Everything is stored now; the second call never reaches the source.
    let (_, again) = get_json(
        &client,
        format!("{}/jobs?search_term=rust&results_wanted=3", server.base_url),
    )
    .await;
    assert_eq!(again["source"], json!({"database": 3, "scraped": 0, "total": 3}));
    assert_eq!(source.call_count(), 1);
}

#[tokio::test]
async fn huge_recency_window_returns_results() {
    let store = InMemoryJobStore::with_jobs([stored("db-1")]);
    let source = Arc::new(ScriptedJobSource::new().respond(vec![scraped("new-1")]));
    let server = TestServer::spawn(services(store, source)).await;

    let (status, body) = get_json(
        &reqwest::Client::new(),
        format!(
            "{}/jobs?search_term=rust&results_wanted=2&hours_old=3000000000",
            server.base_url
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source"], json!({"database": 1, "scraped": 1, "total": 2}));
}

#[tokio::test]
async fn repeated_site_name_parameters_are_accepted() {
    let source = Arc::new(ScriptedJobSource::new());
    let server = TestServer::spawn(services(InMemoryJobStore::new(), source.clone())).await;

    let (status, _) = get_json(
        &reqwest::Client::new(),
        format!(
            "{}/jobs?search_term=rust&site_name=indeed&site_name=linkedin,glassdoor",
            server.base_url
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        source.calls()[0].site_name,
        vec![
            "indeed".to_string(),
            "linkedin".to_string(),
            "glassdoor".to_string()
        ]
    );
}

#[tokio::test]
async fn exhausted_source_with_empty_store_is_503() {
    let source = Arc::new(
        ScriptedJobSource::new()
            .fail(SourceError::Unreachable("connection refused".into()))
            .fail(SourceError::Unreachable("connection refused".into()))
            .fail(SourceError::Unreachable("connection refused".into())),
    );
    let server = TestServer::spawn(services(InMemoryJobStore::new(), source.clone())).await;

    let (status, body) = get_json(
        &reqwest::Client::new(),
        format!("{}/jobs?search_term=rust", server.base_url),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "service_unavailable");
    assert_eq!(source.call_count(), 3);
}

#[tokio::test]
async fn exhausted_source_with_stored_matches_degrades() {
    let source = Arc::new(
        ScriptedJobSource::new()
            .fail(SourceError::RateLimited("slow down".into()))
            .fail(SourceError::RateLimited("slow down".into()))
            .fail(SourceError::RateLimited("slow down".into())),
    );
    let store = InMemoryJobStore::with_jobs([stored("db-1"), stored("db-2")]);
    let server = TestServer::spawn(services(store, source)).await;

    let (status, body) = get_json(
        &reqwest::Client::new(),
        format!("{}/jobs?search_term=rust&results_wanted=5", server.base_url),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source"], json!({"database": 2, "scraped": 0, "total": 2}));
    assert!(body["warning"].as_str().unwrap().contains("stored results only"));
}

#[tokio::test]
async fn permanent_source_failure_is_500() {
    let source = Arc::new(ScriptedJobSource::new().fail(SourceError::Rejected {
        status: 400,
        message: "unknown site".into(),
    }));
    let server = TestServer::spawn(services(InMemoryJobStore::new(), source)).await;

    let (status, body) = get_json(
        &reqwest::Client::new(),
        format!("{}/jobs?search_term=rust", server.base_url),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "internal_error");
}

#[tokio::test]
async fn http_provider_end_to_end() {
    // A stand-in provider that echoes back as many postings as were asked for.
    async fn scrape(Json(query): Json<Value>) -> Json<Value> {
        let wanted = query["results_wanted"].as_u64().unwrap_or(0);
        let jobs: Vec<Value> = (0..wanted)
            .map(|i| provider_record(&format!("remote-{i}")))
            .collect();
        Json(json!({ "jobs": jobs }))
    }
    let provider = TestServer::serve(Router::new().route("/scrape", post(scrape))).await;

    let source = HttpJobSource::new(&provider.base_url, Duration::from_secs(5)).unwrap();
    let store = InMemoryJobStore::new();
    let server = TestServer::spawn(services(store.clone(), Arc::new(source))).await;

    let (status, body) = get_json(
        &reqwest::Client::new(),
        format!("{}/jobs?search_term=rust&results_wanted=4&is_remote=true", server.base_url),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source"], json!({"database": 0, "scraped": 4, "total": 4}));
    assert_eq!(store.len(), 4);
}

#[tokio::test]
async fn cors_allows_the_configured_origin() {
    let server = TestServer::spawn(services(
        InMemoryJobStore::new(),
        Arc::new(ScriptedJobSource::new()),
    ))
    .await;

    let res = reqwest::Client::new()
        .get(format!("{}/health", server.base_url))
        .header("Origin", "http://localhost:3000")
        .send()
        .await
        .unwrap();
    assert_eq!(
        res.headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("http://localhost:3000")
    );
}
