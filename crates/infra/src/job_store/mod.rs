//! Job store boundary.
//!
//! Reads, existence checks and atomic writes of job records, behind a
//! storage-agnostic trait with in-memory and Postgres adapters.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryJobStore;
pub use postgres::{PostgresJobSession, PostgresJobStore};
pub use r#trait::{FailureKind, JobStore, JobStorePool, StoreError, StoreQuery};
