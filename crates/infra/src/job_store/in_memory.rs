use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use jobsearch_core::{JobRecord, NewJob, ProviderId, StoreId};

use super::r#trait::{JobStore, JobStorePool, StoreError, StoreQuery};

/// In-memory job store.
///
/// Intended for tests/dev. Clones share the same records, so the store doubles
/// as its own session pool. Enforces provider-id uniqueness the way the
/// Postgres schema does.
#[derive(Debug, Clone, Default)]
pub struct InMemoryJobStore {
    records: Arc<RwLock<Vec<JobRecord>>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with already-persisted records.
    pub fn with_jobs(jobs: impl IntoIterator<Item = NewJob>) -> Self {
        let records = jobs
            .into_iter()
            .map(|job| job.into_record(StoreId::new()))
            .collect();
        Self {
            records: Arc::new(RwLock::new(records)),
        }
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every stored record, in insertion order.
    pub fn all(&self) -> Vec<JobRecord> {
        self.records.read().map(|r| r.clone()).unwrap_or_default()
    }

    fn matches(record: &JobRecord, query: &StoreQuery) -> bool {
        let posting = record.posting();

        if let Some(text) = &query.text {
            let fields = [
                posting.title.as_deref(),
                posting.company.as_deref(),
                posting.description.as_deref(),
            ];
            if !text.matches_any(fields) {
                return false;
            }
        }

        if let Some(location) = &query.location {
            if !contains_ignore_case(posting.location.as_deref(), location) {
                return false;
            }
        }

        if let Some(remote) = query.is_remote {
            if posting.is_remote != Some(remote) {
                return false;
            }
        }

        if let Some(job_type) = &query.job_type {
            if !contains_ignore_case(posting.job_type.as_deref(), job_type) {
                return false;
            }
        }

        if let Some(since) = query.posted_since {
            match posting.date_posted {
                Some(posted) if posted >= since => {}
                _ => return false,
            }
        }

        true
    }

    fn ensure_unique<'a>(
        existing: &[JobRecord],
        incoming: impl IntoIterator<Item = &'a ProviderId>,
    ) -> Result<(), StoreError> {
        let mut seen: HashSet<&ProviderId> =
            existing.iter().filter_map(|r| r.provider_id()).collect();
        for id in incoming {
            if !seen.insert(id) {
                return Err(StoreError::UniqueViolation(format!(
                    "duplicate provider id {id}"
                )));
            }
        }
        Ok(())
    }
}

fn contains_ignore_case(field: Option<&str>, needle: &str) -> bool {
    field.is_some_and(|f| f.to_lowercase().contains(&needle.to_lowercase()))
}

/// `date_posted` descending with undated records last, then store id ascending.
fn stable_order(a: &JobRecord, b: &JobRecord) -> Ordering {
    let by_date = match (a.posting().date_posted, b.posting().date_posted) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_date.then_with(|| a.store_id().cmp(&b.store_id()))
}

fn poisoned() -> StoreError {
    StoreError::Connection("lock poisoned".to_string())
}

#[async_trait::async_trait]
impl JobStore for InMemoryJobStore {
    async fn search(&mut self, query: &StoreQuery) -> Result<Vec<JobRecord>, StoreError> {
        let records = self.records.read().map_err(|_| poisoned())?;

        let mut matched: Vec<JobRecord> = records
            .iter()
            .filter(|r| Self::matches(r, query))
            .cloned()
            .collect();
        matched.sort_by(stable_order);

        Ok(matched
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .collect())
    }

    async fn existing_provider_ids(
        &mut self,
        ids: &[ProviderId],
    ) -> Result<HashSet<ProviderId>, StoreError> {
        if ids.is_empty() {
            return Ok(HashSet::new());
        }
        let wanted: HashSet<&ProviderId> = ids.iter().collect();
        let records = self.records.read().map_err(|_| poisoned())?;

        Ok(records
            .iter()
            .filter_map(|r| r.provider_id())
            .filter(|id| wanted.contains(id))
            .cloned()
            .collect())
    }

    async fn insert_batch(&mut self, jobs: &[NewJob]) -> Result<Vec<JobRecord>, StoreError> {
        if jobs.is_empty() {
            return Ok(vec![]);
        }
        let mut records = self.records.write().map_err(|_| poisoned())?;

        // Validate the whole batch before touching the store.
        Self::ensure_unique(&records, jobs.iter().map(NewJob::provider_id))?;

        let committed: Vec<JobRecord> = jobs
            .iter()
            .cloned()
            .map(|job| job.into_record(StoreId::new()))
            .collect();
        records.extend(committed.iter().cloned());
        Ok(committed)
    }

    async fn insert_one(&mut self, job: &NewJob) -> Result<JobRecord, StoreError> {
        let mut records = self.records.write().map_err(|_| poisoned())?;
        Self::ensure_unique(&records, [job.provider_id()])?;

        let record = job.clone().into_record(StoreId::new());
        records.push(record.clone());
        Ok(record)
    }
}

#[async_trait::async_trait]
impl JobStorePool for InMemoryJobStore {
    type Session = InMemoryJobStore;

    async fn acquire(&self) -> Result<Self::Session, StoreError> {
        Ok(self.clone())
    }
}
