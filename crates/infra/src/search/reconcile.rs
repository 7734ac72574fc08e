//! Fetch-and-reconcile: top up store results from the external source.
//!
//! Raw postings are normalized, de-duplicated against the store and within
//! the batch, capped at the shortfall, and handed to the committer.

use std::collections::HashSet;

use tracing::{debug, info, instrument};

use jobsearch_core::{JobRecord, ProviderId, RawJob, SearchRequest};

use crate::job_source::{JobSource, SourceQuery};
use crate::job_store::JobStore;
use crate::retry::RetryPolicy;

use super::committer::{self, CommitReport};
use super::error::SearchError;

/// Result of the dedup stage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DedupOutcome {
    /// Survivors, in source order.
    pub accepted: Vec<RawJob>,
    pub missing_id: usize,
    pub already_stored: usize,
    pub repeated: usize,
    /// Records left unexamined once `limit` survivors were found.
    pub over_limit: usize,
}

/// Drop records without a provider id, records already in the store, and
/// in-batch repeats; stop once `limit` records are accepted.
pub fn dedup(batch: Vec<RawJob>, existing: &HashSet<ProviderId>, limit: usize) -> DedupOutcome {
    let mut outcome = DedupOutcome::default();
    let mut seen: HashSet<ProviderId> = HashSet::new();
    let total = batch.len();

    for (examined, raw) in batch.into_iter().enumerate() {
        if outcome.accepted.len() >= limit {
            outcome.over_limit = total - examined;
            break;
        }
        let Some(id) = raw.provider_id() else {
            outcome.missing_id += 1;
            continue;
        };
        if existing.contains(&id) {
            outcome.already_stored += 1;
            continue;
        }
        if !seen.insert(id) {
            outcome.repeated += 1;
            continue;
        }
        outcome.accepted.push(raw);
    }

    outcome
}

/// Records this request added to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    pub records: Vec<JobRecord>,
    pub fetched: usize,
    pub commit: CommitReport,
}

/// Source access with retry, plus dedup and commit.
#[derive(Debug, Clone)]
pub struct ReconcileEngine<Src> {
    source: Src,
    retry: RetryPolicy,
}

impl<Src> ReconcileEngine<Src>
where
    Src: JobSource,
{
    pub fn new(source: Src, retry: RetryPolicy) -> Self {
        Self { source, retry }
    }

    pub fn source(&self) -> &Src {
        &self.source
    }

    /// Fetch up to `additional_needed` new postings and persist them.
    ///
    /// The source is asked to start after the `store_matches` records the
    /// store already returned.
    #[instrument(skip(self, store, request), err)]
    pub async fn fetch_and_reconcile<S>(
        &self,
        store: &mut S,
        request: &SearchRequest,
        additional_needed: u32,
        store_matches: usize,
    ) -> Result<Reconciled, SearchError>
    where
        S: JobStore + ?Sized,
    {
        let offset = request
            .offset
            .saturating_add(u32::try_from(store_matches).unwrap_or(u32::MAX));
        let query = SourceQuery::for_request(request, additional_needed, offset);

        let batch = self
            .retry
            .run("job_source.fetch", || self.source.fetch(&query))
            .await?;
        let fetched = batch.len();
        if batch.is_empty() {
            info!("job source returned no postings");
            return Ok(Reconciled {
                records: Vec::new(),
                fetched,
                commit: CommitReport::empty(0),
            });
        }

        let normalized: Vec<RawJob> = batch.into_iter().map(RawJob::normalize).collect();
        let ids: Vec<ProviderId> = normalized
            .iter()
            .filter_map(RawJob::provider_id)
            .collect();
        let existing = store.existing_provider_ids(&ids).await?;

        let outcome = dedup(normalized, &existing, additional_needed as usize);
        debug!(
            fetched,
            accepted = outcome.accepted.len(),
            missing_id = outcome.missing_id,
            already_stored = outcome.already_stored,
            repeated = outcome.repeated,
            over_limit = outcome.over_limit,
            "deduplicated fetched postings"
        );

        let commit = committer::commit(store, outcome.accepted).await?;
        Ok(Reconciled {
            records: commit.committed.clone(),
            fetched,
            commit,
        })
    }
}
