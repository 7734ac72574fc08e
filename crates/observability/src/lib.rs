//! Process-wide tracing setup shared by the job search binaries.

/// Initialize process-wide observability (tracing/logging).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init(&tracing::TracingConfig::default());
}

/// Tracing configuration (filters, layers).
pub mod tracing;
