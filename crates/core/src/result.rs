//! The search response envelope.

use serde::{Deserialize, Serialize};

use crate::job::JobRecord;

/// Where the returned records came from.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    /// Records that were already in the store.
    pub database: usize,
    /// Records fetched from the provider and persisted by this request.
    pub scraped: usize,
    pub total: usize,
}

/// Ordered result set plus provenance counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub jobs: Vec<JobRecord>,
    pub source: Provenance,
    /// Set when the provider was unavailable and only stored results are returned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl SearchResult {
    pub fn is_degraded(&self) -> bool {
        self.warning.is_some()
    }
}
