use std::collections::HashSet;

use chrono::{DateTime, Utc};
use thiserror::Error;

use jobsearch_core::{JobRecord, NewJob, ProviderId, TextQuery};

/// Filters for reading job records.
///
/// Every `None` means "no filter". Results are ordered by `date_posted`
/// descending (undated last), then by store id, and paged with `offset`/`limit`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StoreQuery {
    /// Matched against title, company and description; any one field may match.
    pub text: Option<TextQuery>,
    /// Case-insensitive substring of `location`.
    pub location: Option<String>,
    /// Exact match on `is_remote`.
    pub is_remote: Option<bool>,
    /// Case-insensitive substring of `job_type`.
    pub job_type: Option<String>,
    /// Only records posted at or after this instant.
    pub posted_since: Option<DateTime<Utc>>,
    pub offset: u32,
    pub limit: u32,
}

/// Classification of a persistence failure.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// A uniqueness constraint rejected the write.
    ConstraintViolation,
    Other,
}

/// Job store operation error.
///
/// Adapters map their native errors into these variants from structured data
/// (e.g. Postgres SQLSTATE codes), never from message text.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("uniqueness constraint violated: {0}")]
    UniqueViolation(String),

    #[error("store connection unavailable: {0}")]
    Connection(String),

    #[error("database error in {operation}: {message}")]
    Database {
        operation: &'static str,
        message: String,
    },

    #[error("failed to decode job row: {0}")]
    Decode(String),
}

impl StoreError {
    pub fn database(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Database {
            operation,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            StoreError::UniqueViolation(_) => FailureKind::ConstraintViolation,
            _ => FailureKind::Other,
        }
    }

    pub fn is_constraint_violation(&self) -> bool {
        self.kind() == FailureKind::ConstraintViolation
    }
}

/// One unit of work against the job store (a single checked-out connection).
///
/// ## Write semantics
///
/// - `insert_batch` is atomic: either every record is committed or none is.
///   A uniqueness conflict anywhere in the batch rolls the whole batch back.
/// - `insert_one` commits a single record in its own transaction.
///
/// Both assign a fresh `StoreId` to every committed record. Dropping an
/// in-flight write future rolls back its transaction.
#[async_trait::async_trait]
pub trait JobStore: Send {
    /// Read records matching `query`, in stable order.
    async fn search(&mut self, query: &StoreQuery) -> Result<Vec<JobRecord>, StoreError>;

    /// The subset of `ids` already persisted (one round trip).
    async fn existing_provider_ids(
        &mut self,
        ids: &[ProviderId],
    ) -> Result<HashSet<ProviderId>, StoreError>;

    /// Commit all records in one transaction.
    async fn insert_batch(&mut self, jobs: &[NewJob]) -> Result<Vec<JobRecord>, StoreError>;

    /// Commit one record in its own transaction.
    async fn insert_one(&mut self, job: &NewJob) -> Result<JobRecord, StoreError>;
}

/// A bounded source of store sessions.
///
/// Sessions are released when dropped, so a request can never leak its
/// connection past its own scope.
#[async_trait::async_trait]
pub trait JobStorePool: Send + Sync {
    type Session: JobStore;

    async fn acquire(&self) -> Result<Self::Session, StoreError>;
}

#[async_trait::async_trait]
impl<S> JobStore for &mut S
where
    S: JobStore + ?Sized,
{
    async fn search(&mut self, query: &StoreQuery) -> Result<Vec<JobRecord>, StoreError> {
        (**self).search(query).await
    }

    async fn existing_provider_ids(
        &mut self,
        ids: &[ProviderId],
    ) -> Result<HashSet<ProviderId>, StoreError> {
        (**self).existing_provider_ids(ids).await
    }

    async fn insert_batch(&mut self, jobs: &[NewJob]) -> Result<Vec<JobRecord>, StoreError> {
        (**self).insert_batch(jobs).await
    }

    async fn insert_one(&mut self, job: &NewJob) -> Result<JobRecord, StoreError> {
        (**self).insert_one(job).await
    }
}
