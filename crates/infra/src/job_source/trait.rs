use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use jobsearch_core::{RawJob, SearchRequest};

use crate::retry::Retryable;

/// Request sent to the external job source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceQuery {
    pub site_name: Vec<String>,
    pub search_term: String,
    pub location: String,
    pub results_wanted: u32,
    pub hours_old: i64,
    pub country_indeed: String,
    pub job_type: String,
    pub is_remote: bool,
    pub offset: u32,
    pub interval: String,
    pub enforce_annual_salary: bool,
    pub description_format: String,
}

impl SourceQuery {
    /// Ask for `results_wanted` postings starting at `offset`, carrying the
    /// rest of the request through unchanged.
    pub fn for_request(request: &SearchRequest, results_wanted: u32, offset: u32) -> Self {
        Self {
            site_name: request.sites.clone(),
            search_term: request.search_term.clone(),
            location: request.location.clone(),
            results_wanted,
            hours_old: request.hours_old,
            country_indeed: request.country.clone(),
            job_type: request.job_type.clone(),
            is_remote: request.is_remote.unwrap_or(false),
            offset,
            interval: request.interval.clone(),
            enforce_annual_salary: true,
            description_format: "html".to_string(),
        }
    }
}

/// External job source failure.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Network, connect or timeout failure.
    #[error("job source unreachable: {0}")]
    Unreachable(String),

    #[error("job source rate limited the request: {0}")]
    RateLimited(String),

    /// The source answered with a server-side error.
    #[error("job source failed with status {status}: {message}")]
    Upstream { status: u16, message: String },

    /// The source refused the request itself; retrying will not help.
    #[error("job source rejected the request with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("job source returned an undecodable response: {0}")]
    Malformed(String),
}

impl Retryable for SourceError {
    fn is_transient(&self) -> bool {
        matches!(
            self,
            SourceError::Unreachable(_) | SourceError::RateLimited(_) | SourceError::Upstream { .. }
        )
    }
}

impl SourceError {
    pub fn is_transient(&self) -> bool {
        Retryable::is_transient(self)
    }
}

/// The external job-search provider.
#[async_trait::async_trait]
pub trait JobSource: Send + Sync {
    /// Fetch raw postings for `query`. An empty vector is a valid answer.
    async fn fetch(&self, query: &SourceQuery) -> Result<Vec<RawJob>, SourceError>;
}

#[async_trait::async_trait]
impl<S> JobSource for Arc<S>
where
    S: JobSource + ?Sized,
{
    async fn fetch(&self, query: &SourceQuery) -> Result<Vec<RawJob>, SourceError> {
        (**self).fetch(query).await
    }
}
