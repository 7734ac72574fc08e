//! Tracing/logging initialization.
//!
//! JSON log lines with timestamps, filtered by `RUST_LOG` (falling back to a
//! default directive that keeps SQLx and HTTP client chatter at `warn`).

use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVE: &str = "info,sqlx=warn,hyper=warn,reqwest=warn";

/// Subscriber options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracingConfig {
    /// Filter used when `RUST_LOG` is unset or invalid.
    pub default_directive: String,
    /// Include the emitting module path in each line.
    pub with_target: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            default_directive: DEFAULT_DIRECTIVE.to_string(),
            with_target: false,
        }
    }
}

/// Build the level filter: `RUST_LOG` wins, then the configured default.
pub fn env_filter(config: &TracingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.default_directive))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize tracing/logging for the process.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init(config: &TracingConfig) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(config))
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(config.with_target)
        .try_init();
}
