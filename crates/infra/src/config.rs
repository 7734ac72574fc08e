//! Process configuration loaded from the environment.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use dotenvy::dotenv;

use crate::retry::RetryPolicy;
use crate::search::SearchSettings;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub bind_addr: String,
    /// Absent means the in-memory store.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub db_acquire_timeout: Duration,
    /// Absent means an empty scripted source.
    pub job_source_url: Option<String>,
    pub job_source_timeout: Duration,
    pub source_retry: RetryPolicy,
    pub request_timeout: Duration,
    pub max_results_wanted: u32,
    pub cors_allowed_origin: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            database_url: None,
            db_max_connections: 20,
            db_acquire_timeout: Duration::from_secs(5),
            job_source_url: None,
            job_source_timeout: Duration::from_secs(60),
            source_retry: RetryPolicy::default(),
            request_timeout: Duration::from_secs(120),
            max_results_wanted: 100,
            cors_allowed_origin: "http://localhost:3000".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let source_retry = RetryPolicy::exponential(
            parse_or(&get, "SOURCE_MAX_ATTEMPTS", defaults.source_retry.max_attempts)?,
            Duration::from_millis(parse_or(
                &get,
                "SOURCE_BACKOFF_BASE_MS",
                defaults.source_retry.base_delay.as_millis() as u64,
            )?),
            Duration::from_millis(parse_or(
                &get,
                "SOURCE_BACKOFF_MAX_MS",
                defaults.source_retry.max_delay.as_millis() as u64,
            )?),
        );

        let config = Self {
            bind_addr: get("BIND_ADDR").unwrap_or(defaults.bind_addr),
            database_url: get("DATABASE_URL"),
            db_max_connections: parse_or(&get, "DB_MAX_CONNECTIONS", defaults.db_max_connections)?,
            db_acquire_timeout: Duration::from_secs(parse_or(
                &get,
                "DB_ACQUIRE_TIMEOUT_SECS",
                defaults.db_acquire_timeout.as_secs(),
            )?),
            job_source_url: get("JOB_SOURCE_URL"),
            job_source_timeout: Duration::from_secs(parse_or(
                &get,
                "JOB_SOURCE_TIMEOUT_SECS",
                defaults.job_source_timeout.as_secs(),
            )?),
            source_retry,
            request_timeout: Duration::from_secs(parse_or(
                &get,
                "REQUEST_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )?),
            max_results_wanted: parse_or(&get, "MAX_RESULTS_WANTED", defaults.max_results_wanted)?,
            cors_allowed_origin: get("CORS_ALLOWED_ORIGIN").unwrap_or(defaults.cors_allowed_origin),
        };

        anyhow::ensure!(
            config.db_max_connections > 0,
            "DB_MAX_CONNECTIONS must be at least 1"
        );
        anyhow::ensure!(
            config.max_results_wanted > 0,
            "MAX_RESULTS_WANTED must be at least 1"
        );
        Ok(config)
    }

    pub fn search_settings(&self) -> SearchSettings {
        SearchSettings {
            request_timeout: self.request_timeout,
            max_results_wanted: self.max_results_wanted,
        }
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} must be a valid number, got {raw:?}")),
        None => Ok(default),
    }
}
