//! The resolved search request.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::text_query::TextQuery;

pub const DEFAULT_RESULTS_WANTED: u32 = 10;
pub const DEFAULT_HOURS_OLD: i64 = 72;
pub const DEFAULT_COUNTRY: &str = "USA";
pub const DEFAULT_INTERVAL: &str = "yearly";
pub const DEFAULT_SITES: &[&str] = &["indeed", "linkedin"];

/// A search request with every default applied.
///
/// Built once per request and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub search_term: String,
    pub sites: Vec<String>,
    /// `None` applies no remoteness filter.
    pub is_remote: Option<bool>,
    pub location: String,
    pub results_wanted: u32,
    /// Salary interval hint forwarded to the provider.
    pub interval: String,
    pub country: String,
    pub job_type: String,
    /// Recency window; `<= 0` disables the filter.
    pub hours_old: i64,
    pub offset: u32,
}

impl SearchRequest {
    /// A request for `search_term` with all other fields defaulted.
    pub fn new(search_term: impl Into<String>) -> Self {
        Self {
            search_term: search_term.into(),
            sites: DEFAULT_SITES.iter().map(|s| s.to_string()).collect(),
            is_remote: None,
            location: String::new(),
            results_wanted: DEFAULT_RESULTS_WANTED,
            interval: DEFAULT_INTERVAL.to_string(),
            country: DEFAULT_COUNTRY.to_string(),
            job_type: String::new(),
            hours_old: DEFAULT_HOURS_OLD,
            offset: 0,
        }
    }

    pub fn with_results_wanted(mut self, n: u32) -> Self {
        self.results_wanted = n;
        self
    }

    pub fn with_offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    pub fn with_remote(mut self, is_remote: Option<bool>) -> Self {
        self.is_remote = is_remote;
        self
    }

    pub fn with_job_type(mut self, job_type: impl Into<String>) -> Self {
        self.job_type = job_type.into();
        self
    }

    pub fn with_hours_old(mut self, hours_old: i64) -> Self {
        self.hours_old = hours_old;
        self
    }

    pub fn with_sites(mut self, sites: Vec<String>) -> Self {
        self.sites = sites;
        self
    }

    /// Check the request against `max_results_wanted`.
    pub fn validate(&self, max_results_wanted: u32) -> DomainResult<()> {
        if self.results_wanted == 0 {
            return Err(DomainError::validation("results_wanted must be at least 1"));
        }
        if self.results_wanted > max_results_wanted {
            return Err(DomainError::validation(format!(
                "results_wanted must be at most {max_results_wanted}"
            )));
        }
        if self.sites.is_empty() {
            return Err(DomainError::validation("at least one site is required"));
        }
        Ok(())
    }

    /// Parsed free-text query, if the search term has searchable words.
    pub fn text_query(&self) -> Option<TextQuery> {
        TextQuery::parse(&self.search_term)
    }

    /// Recency window in hours, or `None` when disabled.
    pub fn recency_window(&self) -> Option<i64> {
        (self.hours_old > 0).then_some(self.hours_old)
    }
}
