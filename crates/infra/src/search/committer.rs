//! Persistence of fetched records.
//!
//! The whole batch is first written in one transaction. If that transaction
//! hits a uniqueness conflict (a concurrent request stored the same posting
//! between our existence check and our insert), it is rolled back and the
//! batch is replayed one record per transaction. Every record then walks
//! `Pending -> Committed | SkippedDuplicate | Failed`.

use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use jobsearch_core::{JobRecord, NewJob, ProviderId, RawJob};

use crate::job_store::{JobStore, StoreError};

/// Lifecycle of a single record in the per-record fallback.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordState {
    Pending,
    Committed(JobRecord),
    SkippedDuplicate,
    Failed(String),
}

impl RecordState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RecordState::Pending)
    }
}

/// Which write strategy produced the report.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitPath {
    /// Nothing valid to write.
    Skipped,
    Bulk,
    PerRecord,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitFailure {
    pub provider_id: ProviderId,
    pub reason: String,
}

/// Outcome of committing one batch.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitReport {
    pub path: CommitPath,
    /// Committed records in batch order, each with its store id.
    pub committed: Vec<JobRecord>,
    pub duplicates: usize,
    pub malformed: usize,
    pub failures: Vec<CommitFailure>,
}

impl CommitReport {
    pub(crate) fn empty(malformed: usize) -> Self {
        Self {
            path: CommitPath::Skipped,
            committed: Vec::new(),
            duplicates: 0,
            malformed,
            failures: Vec::new(),
        }
    }
}

#[derive(Debug)]
struct PendingRecord {
    job: NewJob,
    state: RecordState,
}

impl PendingRecord {
    fn new(job: NewJob) -> Self {
        Self {
            job,
            state: RecordState::Pending,
        }
    }

    /// Apply the outcome of this record's own transaction.
    fn resolve(&mut self, outcome: Result<JobRecord, StoreError>) {
        debug_assert!(!self.state.is_terminal(), "record resolved twice");
        self.state = match outcome {
            Ok(record) => RecordState::Committed(record),
            Err(e) if e.is_constraint_violation() => RecordState::SkippedDuplicate,
            Err(e) => RecordState::Failed(e.to_string()),
        };
    }
}

/// Build `NewJob`s, skipping malformed records.
fn prepare(batch: Vec<RawJob>) -> (Vec<NewJob>, usize) {
    let mut jobs = Vec::with_capacity(batch.len());
    let mut malformed = 0;
    for raw in batch {
        let title = raw.display_title().to_string();
        match raw.into_new_job() {
            Ok(job) => jobs.push(job),
            Err(e) => {
                malformed += 1;
                warn!(title = %title, error = %e, "skipping malformed job record");
            }
        }
    }
    (jobs, malformed)
}

/// Persist `batch`, returning what was committed.
///
/// Errors only for non-conflict failures of the bulk transaction; per-record
/// failures in the fallback are reported, not raised.
#[instrument(skip(store, batch), fields(batch = batch.len()), err)]
pub async fn commit<S>(store: &mut S, batch: Vec<RawJob>) -> Result<CommitReport, StoreError>
where
    S: JobStore + ?Sized,
{
    let (jobs, malformed) = prepare(batch);
    if jobs.is_empty() {
        return Ok(CommitReport::empty(malformed));
    }

    match store.insert_batch(&jobs).await {
        Ok(committed) => {
            info!(committed = committed.len(), malformed, "bulk commit succeeded");
            Ok(CommitReport {
                path: CommitPath::Bulk,
                committed,
                duplicates: 0,
                malformed,
                failures: Vec::new(),
            })
        }
        Err(e) if e.is_constraint_violation() => {
            info!(error = %e, "bulk commit conflicted, retrying record by record");
            Ok(commit_each(store, jobs, malformed).await)
        }
        Err(e) => {
            error!(error = %e, "bulk commit failed");
            Err(e)
        }
    }
}

async fn commit_each<S>(store: &mut S, jobs: Vec<NewJob>, malformed: usize) -> CommitReport
where
    S: JobStore + ?Sized,
{
    let mut records: Vec<PendingRecord> = jobs.into_iter().map(PendingRecord::new).collect();
    for record in &mut records {
        let outcome = store.insert_one(&record.job).await;
        record.resolve(outcome);
    }

    let mut report = CommitReport {
        path: CommitPath::PerRecord,
        committed: Vec::new(),
        duplicates: 0,
        malformed,
        failures: Vec::new(),
    };
    for PendingRecord { job, state } in records {
        match state {
            RecordState::Committed(record) => report.committed.push(record),
            RecordState::SkippedDuplicate => {
                debug!(provider_id = %job.provider_id(), "record already stored");
                report.duplicates += 1;
            }
            RecordState::Failed(reason) => {
                error!(provider_id = %job.provider_id(), reason = %reason, "failed to store record");
                report.failures.push(CommitFailure {
                    provider_id: job.provider_id().clone(),
                    reason,
                });
            }
            RecordState::Pending => {}
        }
    }

    info!(
        committed = report.committed.len(),
        duplicates = report.duplicates,
        failed = report.failures.len(),
        "per-record commit finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use serde_json::json;

    use crate::job_store::{InMemoryJobStore, StoreQuery};

    use super::*;

    fn raw(id: &str) -> RawJob {
        RawJob::from_value(json!({"id": id, "title": format!("Job {id}")})).unwrap()
    }

    fn new_job(id: &str) -> NewJob {
        raw(id).into_new_job().unwrap()
    }

    /// Wraps the in-memory store and injects write failures.
    struct FaultyStore {
        inner: InMemoryJobStore,
        fail_bulk: bool,
        fail_one_for: HashSet<String>,
        /// Records stored "concurrently" just before the bulk write.
        race: Vec<NewJob>,
    }

    impl FaultyStore {
        fn new(inner: InMemoryJobStore) -> Self {
            Self {
                inner,
                fail_bulk: false,
                fail_one_for: HashSet::new(),
                race: Vec::new(),
            }
        }
    }

    #[async_trait::async_trait]
    impl JobStore for FaultyStore {
        async fn search(&mut self, query: &StoreQuery) -> Result<Vec<JobRecord>, StoreError> {
            self.inner.search(query).await
        }

        async fn existing_provider_ids(
            &mut self,
            ids: &[ProviderId],
        ) -> Result<HashSet<ProviderId>, StoreError> {
            self.inner.existing_provider_ids(ids).await
        }

        async fn insert_batch(&mut self, jobs: &[NewJob]) -> Result<Vec<JobRecord>, StoreError> {
            for job in self.race.drain(..) {
                self.inner.insert_one(&job).await?;
            }
            if self.fail_bulk {
                return Err(StoreError::database("insert_batch", "connection reset"));
            }
            self.inner.insert_batch(jobs).await
        }

        async fn insert_one(&mut self, job: &NewJob) -> Result<JobRecord, StoreError> {
            if self.fail_one_for.contains(job.provider_id().as_str()) {
                return Err(StoreError::database("insert_one", "disk full"));
            }
            self.inner.insert_one(job).await
        }
    }

    #[test]
    fn record_state_transitions() {
        let mut committed = PendingRecord::new(new_job("a"));
        assert!(!committed.state.is_terminal());
        committed.resolve(Ok(new_job("a").into_record(jobsearch_core::StoreId::new())));
        assert!(matches!(committed.state, RecordState::Committed(_)));

        let mut duplicate = PendingRecord::new(new_job("b"));
        duplicate.resolve(Err(StoreError::UniqueViolation("b".into())));
        assert_eq!(duplicate.state, RecordState::SkippedDuplicate);

        let mut failed = PendingRecord::new(new_job("c"));
        failed.resolve(Err(StoreError::Connection("gone".into())));
        assert!(matches!(failed.state, RecordState::Failed(_)));
    }

    #[tokio::test]
    async fn bulk_path_commits_everything() {
        let mut store = InMemoryJobStore::new();
        let report = commit(&mut store, vec![raw("a"), raw("b")]).await.unwrap();

        assert_eq!(report.path, CommitPath::Bulk);
        assert_eq!(report.committed.len(), 2);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn malformed_records_are_skipped_before_writing() {
        let mut store = InMemoryJobStore::new();
        let bad = RawJob::from_value(json!({"id": "bad", "min_amount": "lots"})).unwrap();

        let report = commit(&mut store, vec![raw("a"), bad, raw("c")])
            .await
            .unwrap();
        assert_eq!(report.malformed, 1);
        assert_eq!(report.committed.len(), 2);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn empty_batch_writes_nothing() {
        let mut store = InMemoryJobStore::new();
        let report = commit(&mut store, Vec::new()).await.unwrap();
        assert_eq!(report.path, CommitPath::Skipped);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn conflict_falls_back_to_per_record_commits() {
        let shared = InMemoryJobStore::new();
        let mut store = FaultyStore::new(shared.clone());
        store.race = vec![new_job("b")];

        let report = commit(&mut store, vec![raw("a"), raw("b"), raw("c")])
            .await
            .unwrap();

        assert_eq!(report.path, CommitPath::PerRecord);
        assert_eq!(report.duplicates, 1);
        let committed: Vec<_> = report
            .committed
            .iter()
            .map(|r| r.provider_id().unwrap().as_str().to_string())
            .collect();
        assert_eq!(committed, vec!["a", "c"]);

        // No provider id is stored twice.
        let stored: Vec<_> = shared.all();
        let unique: HashSet<_> = stored.iter().filter_map(|r| r.provider_id()).collect();
        assert_eq!(stored.len(), 3);
        assert_eq!(unique.len(), 3);
    }

    #[tokio::test]
    async fn per_record_failures_do_not_abort_the_batch() {
        let shared = InMemoryJobStore::new();
        let mut store = FaultyStore::new(shared.clone());
        store.race = vec![new_job("a")];
        store.fail_one_for.insert("b".to_string());

        let report = commit(&mut store, vec![raw("a"), raw("b"), raw("c")])
            .await
            .unwrap();

        assert_eq!(report.duplicates, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].provider_id.as_str(), "b");
        assert_eq!(report.committed.len(), 1);
        assert_eq!(shared.len(), 2);
    }

    #[tokio::test]
    async fn non_conflict_bulk_failure_is_fatal() {
        let shared = InMemoryJobStore::new();
        let mut store = FaultyStore::new(shared.clone());
        store.fail_bulk = true;

        let err = commit(&mut store, vec![raw("a")]).await.unwrap_err();
        assert!(!err.is_constraint_violation());
        assert!(shared.is_empty());
    }
}
