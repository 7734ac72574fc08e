//! Query planning: what the store already has, and how much is still missing.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, instrument};

use jobsearch_core::{JobRecord, SearchRequest};

use crate::job_store::{JobStore, StoreError, StoreQuery};

/// Store matches for a request plus the shortfall against `results_wanted`.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedQuery {
    pub matches: Vec<JobRecord>,
    pub additional_needed: u32,
}

/// Translate a request into store filters. `now` anchors the recency window.
pub fn store_query(request: &SearchRequest, now: DateTime<Utc>) -> StoreQuery {
    StoreQuery {
        text: request.text_query(),
        location: non_blank(&request.location),
        is_remote: request.is_remote,
        job_type: non_blank(&request.job_type),
        posted_since: request
            .recency_window()
            .and_then(|hours| recency_cutoff(now, hours)),
        offset: request.offset,
        limit: request.results_wanted,
    }
}

/// Oldest posting time inside an `hours`-wide window ending at `now`.
/// A window reaching past the representable range applies no cutoff.
fn recency_cutoff(now: DateTime<Utc>, hours: i64) -> Option<DateTime<Utc>> {
    Duration::try_hours(hours).and_then(|window| now.checked_sub_signed(window))
}

pub fn additional_needed(results_wanted: u32, matched: usize) -> u32 {
    let matched = u32::try_from(matched).unwrap_or(u32::MAX);
    results_wanted.saturating_sub(matched)
}

#[instrument(skip(store, request), fields(results_wanted = request.results_wanted, offset = request.offset), err)]
pub async fn plan<S>(
    store: &mut S,
    request: &SearchRequest,
    now: DateTime<Utc>,
) -> Result<PlannedQuery, StoreError>
where
    S: JobStore + ?Sized,
{
    let query = store_query(request, now);
    let matches = store.search(&query).await?;
    let additional_needed = additional_needed(request.results_wanted, matches.len());

    debug!(matched = matches.len(), additional_needed, "planned query");
    Ok(PlannedQuery {
        matches,
        additional_needed,
    })
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
