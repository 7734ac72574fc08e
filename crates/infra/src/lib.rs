//! Infrastructure layer: job store, external job source, retry, configuration,
//! and the search pipeline that ties them together.

pub mod config;
pub mod job_source;
pub mod job_store;
pub mod retry;
pub mod search;
