//! The search pipeline.
//!
//! Query Planner -> Job Store read -> Fetch-and-Reconcile (retry, NaN
//! normalization, dedup) -> Persistence Committer -> Result Composer.

pub mod committer;
pub mod composer;
pub mod error;
pub mod planner;
pub mod reconcile;
pub mod service;

pub use committer::{CommitFailure, CommitPath, CommitReport, RecordState};
pub use composer::compose;
pub use error::SearchError;
pub use planner::PlannedQuery;
pub use reconcile::{DedupOutcome, ReconcileEngine, Reconciled, dedup};
pub use service::{SearchService, SearchSettings};
