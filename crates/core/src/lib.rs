//! `jobsearch-core` — domain building blocks for job search.
//!
//! This crate contains **pure domain** types (no infrastructure concerns):
//! identifiers, job postings in their raw/fetched/stored shapes, the search
//! request and response envelope, and free-text query parsing.

pub mod error;
pub mod id;
pub mod job;
pub mod request;
pub mod result;
pub mod text_query;

pub use error::{DomainError, DomainResult};
pub use id::{ProviderId, StoreId};
pub use job::{JobPosting, JobRecord, NewJob, RawJob};
pub use request::SearchRequest;
pub use result::{Provenance, SearchResult};
pub use text_query::TextQuery;
