use std::time::Duration;

use thiserror::Error;

use jobsearch_core::DomainError;

use crate::job_source::SourceError;
use crate::job_store::StoreError;
use crate::retry::RetryError;

/// Failure of a whole search request.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid search request: {0}")]
    InvalidRequest(#[from] DomainError),

    /// Transient source failures outlasted the retry policy.
    #[error("job source unavailable after {attempts} attempts: {last}")]
    SourceUnavailable { attempts: u32, last: SourceError },

    /// The source failed in a way retrying cannot fix.
    #[error("job source failed: {0}")]
    Source(SourceError),

    #[error("job store failed: {0}")]
    Store(#[from] StoreError),

    #[error("search timed out after {0:?}")]
    TimedOut(Duration),
}

impl SearchError {
    /// Whether the caller should see "service unavailable" rather than an
    /// internal failure.
    pub fn is_service_unavailable(&self) -> bool {
        matches!(
            self,
            SearchError::SourceUnavailable { .. } | SearchError::TimedOut(_)
        )
    }
}

impl From<RetryError<SourceError>> for SearchError {
    fn from(err: RetryError<SourceError>) -> Self {
        match err {
            RetryError::Exhausted { attempts, last } => {
                SearchError::SourceUnavailable { attempts, last }
            }
            RetryError::Permanent(e) => SearchError::Source(e),
        }
    }
}
