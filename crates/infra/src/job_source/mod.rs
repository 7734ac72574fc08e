//! External job source boundary.
//!
//! The provider that scrapes job boards on demand, behind a trait with an
//! HTTP adapter and a scripted in-process adapter.

pub mod http;
pub mod scripted;
pub mod r#trait;

pub use http::HttpJobSource;
pub use scripted::ScriptedJobSource;
pub use r#trait::{JobSource, SourceError, SourceQuery};
