//! Merge store and freshly fetched records into one bounded response.

use jobsearch_core::{JobRecord, Provenance, SearchResult};

/// Store-origin records first, then fetch-origin, truncated to
/// `results_wanted`. Provenance counts what was actually returned.
pub fn compose(
    stored: Vec<JobRecord>,
    fetched: Vec<JobRecord>,
    results_wanted: u32,
    warning: Option<String>,
) -> SearchResult {
    let limit = results_wanted as usize;

    let database = stored.len().min(limit);
    let scraped = fetched.len().min(limit - database);

    let mut jobs = Vec::with_capacity(database + scraped);
    jobs.extend(stored.into_iter().take(database));
    jobs.extend(fetched.into_iter().take(scraped));

    SearchResult {
        source: Provenance {
            database,
            scraped,
            total: jobs.len(),
        },
        jobs,
        warning,
    }
}

#[cfg(test)]
mod tests {
    use jobsearch_core::{JobPosting, NewJob, ProviderId, StoreId};

    use super::*;

    fn records(prefix: &str, n: usize) -> Vec<JobRecord> {
        (0..n)
            .map(|i| {
                NewJob::new(
                    ProviderId::new(format!("{prefix}{i}")).unwrap(),
                    JobPosting::default(),
                )
                .into_record(StoreId::new())
            })
            .collect()
    }

    #[test]
    fn stored_records_come_first() {
        let result = compose(records("db", 2), records("new", 2), 10, None);
        let ids: Vec<_> = result
            .jobs
            .iter()
            .map(|r| r.provider_id().unwrap().as_str().to_string())
            .collect();
        assert_eq!(ids, vec!["db0", "db1", "new0", "new1"]);
        assert_eq!(
            result.source,
            Provenance {
                database: 2,
                scraped: 2,
                total: 4
            }
        );
    }

    #[test]
    fn fetched_records_are_truncated_first() {
        let result = compose(records("db", 3), records("new", 7), 5, None);
        assert_eq!(
            result.source,
            Provenance {
                database: 3,
                scraped: 2,
                total: 5
            }
        );
    }

    #[test]
    fn warning_is_carried_through() {
        let result = compose(records("db", 1), Vec::new(), 5, Some("degraded".into()));
        assert!(result.is_degraded());
        assert_eq!(result.source.total, 1);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 256,
                ..ProptestConfig::default()
            })]

            /// Property: the response is bounded and provenance always adds up.
            #[test]
            fn provenance_adds_up(stored in 0usize..15, fetched in 0usize..15, wanted in 0u32..20) {
                let result = compose(records("db", stored), records("new", fetched), wanted, None);

                prop_assert!(result.jobs.len() <= wanted as usize);
                prop_assert_eq!(result.source.total, result.jobs.len());
                prop_assert_eq!(result.source.database + result.source.scraped, result.source.total);
                prop_assert_eq!(result.source.database, stored.min(wanted as usize));
            }
        }
    }
}
