//! HTTP adapter for the external job-search provider.
//!
//! Sends `POST {base_url}/scrape` with a JSON `SourceQuery` body. The provider
//! answers with either a JSON array of postings or `{"jobs": [...]}`.

use std::time::Duration;

use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use jobsearch_core::RawJob;

use super::r#trait::{JobSource, SourceError, SourceQuery};

/// reqwest-backed job source.
#[derive(Debug, Clone)]
pub struct HttpJobSource {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpJobSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SourceError::Unreachable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            endpoint: format!("{}/scrape", base_url.trim_end_matches('/')),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait::async_trait]
impl JobSource for HttpJobSource {
    #[instrument(
        skip(self, query),
        fields(endpoint = %self.endpoint, results_wanted = query.results_wanted, offset = query.offset),
        err
    )]
    async fn fetch(&self, query: &SourceQuery) -> Result<Vec<RawJob>, SourceError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(query)
            .send()
            .await
            .map_err(|e| SourceError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, body));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| SourceError::Unreachable(format!("failed to read response body: {e}")))?;

        let jobs = parse_body(&body)?;
        debug!(count = jobs.len(), "job source responded");
        Ok(jobs)
    }
}

fn classify_status(status: StatusCode, body: String) -> SourceError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        SourceError::RateLimited(body)
    } else if status.is_server_error() {
        SourceError::Upstream {
            status: status.as_u16(),
            message: body,
        }
    } else {
        SourceError::Rejected {
            status: status.as_u16(),
            message: body,
        }
    }
}

/// Decode a provider response into raw records. Non-object entries are dropped.
fn parse_body(body: &[u8]) -> Result<Vec<RawJob>, SourceError> {
    let value: Value =
        serde_json::from_slice(body).map_err(|e| SourceError::Malformed(e.to_string()))?;

    let entries = match value {
        Value::Array(entries) => entries,
        Value::Object(mut envelope) => match envelope.remove("jobs") {
            Some(Value::Array(entries)) => entries,
            Some(Value::Null) => Vec::new(),
            _ => {
                return Err(SourceError::Malformed(
                    "expected an array or an object with a `jobs` array".to_string(),
                ));
            }
        },
        Value::Null => Vec::new(),
        other => {
            return Err(SourceError::Malformed(format!(
                "expected an array of postings, got {other}"
            )));
        }
    };

    Ok(entries
        .into_iter()
        .enumerate()
        .filter_map(|(idx, entry)| match RawJob::from_value(entry) {
            Ok(job) => Some(job),
            Err(e) => {
                warn!(index = idx, error = %e, "dropping non-object posting");
                None
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_base_url() {
        let source = HttpJobSource::new("http://scraper:8000/", Duration::from_secs(1)).unwrap();
        assert_eq!(source.endpoint(), "http://scraper:8000/scrape");
    }

    #[test]
    fn status_classification() {
        assert!(classify_status(StatusCode::TOO_MANY_REQUESTS, String::new()).is_transient());
        assert!(classify_status(StatusCode::BAD_GATEWAY, String::new()).is_transient());
        assert!(classify_status(StatusCode::SERVICE_UNAVAILABLE, String::new()).is_transient());
        assert!(!classify_status(StatusCode::BAD_REQUEST, String::new()).is_transient());
        assert!(!classify_status(StatusCode::NOT_FOUND, String::new()).is_transient());
    }

    #[test]
    fn parses_bare_array_and_envelope() {
        let bare = parse_body(br#"[{"id": "a"}, {"id": "b"}]"#).unwrap();
        assert_eq!(bare.len(), 2);

        let wrapped = parse_body(br#"{"jobs": [{"id": "a"}]}"#).unwrap();
        assert_eq!(wrapped.len(), 1);
        assert_eq!(wrapped[0].provider_id().unwrap().as_str(), "a");

        assert!(parse_body(b"null").unwrap().is_empty());
    }

    #[test]
    fn non_object_entries_are_dropped() {
        let jobs = parse_body(br#"[{"id": "a"}, 3, "x"]"#).unwrap();
        assert_eq!(jobs.len(), 1);
    }

    #[test]
    fn undecodable_bodies_are_permanent_failures() {
        let err = parse_body(b"<html>oops</html>").unwrap_err();
        assert!(matches!(err, SourceError::Malformed(_)));
        assert!(!err.is_transient());

        assert!(parse_body(br#"{"results": []}"#).is_err());
        assert!(parse_body(b"42").is_err());
    }
}
