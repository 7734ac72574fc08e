//! Infrastructure wiring: job store, job source and the search service.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use jobsearch_core::{SearchRequest, SearchResult};
use jobsearch_infra::{
    config::AppConfig,
    job_source::{HttpJobSource, JobSource, ScriptedJobSource},
    job_store::{InMemoryJobStore, PostgresJobStore},
    retry::RetryPolicy,
    search::{ReconcileEngine, SearchError, SearchService, SearchSettings},
};

/// The provider adapter shared by every request.
pub type SharedJobSource = Arc<dyn JobSource>;

/// Search service over one of the supported store backends.
pub enum AppServices {
    InMemory(SearchService<InMemoryJobStore, SharedJobSource>),
    Persistent(SearchService<PostgresJobStore, SharedJobSource>),
}

impl AppServices {
    /// In-memory store with an explicit source; used by tests and local runs.
    pub fn in_memory(
        store: InMemoryJobStore,
        source: SharedJobSource,
        retry: RetryPolicy,
        settings: SearchSettings,
    ) -> Self {
        Self::InMemory(SearchService::new(
            store,
            ReconcileEngine::new(source, retry),
            settings,
        ))
    }

    pub fn persistent(
        store: PostgresJobStore,
        source: SharedJobSource,
        retry: RetryPolicy,
        settings: SearchSettings,
    ) -> Self {
        Self::Persistent(SearchService::new(
            store,
            ReconcileEngine::new(source, retry),
            settings,
        ))
    }

    pub async fn search(&self, request: SearchRequest) -> Result<SearchResult, SearchError> {
        match self {
            Self::InMemory(service) => service.search(request).await,
            Self::Persistent(service) => service.search(request).await,
        }
    }

    pub fn settings(&self) -> SearchSettings {
        match self {
            Self::InMemory(service) => service.settings(),
            Self::Persistent(service) => service.settings(),
        }
    }

    pub fn backend(&self) -> &'static str {
        match self {
            Self::InMemory(_) => "in_memory",
            Self::Persistent(_) => "postgres",
        }
    }
}

/// Build services from configuration.
///
/// `DATABASE_URL` selects Postgres (schema is created on startup), otherwise
/// records live in memory for the life of the process. `JOB_SOURCE_URL`
/// selects the HTTP provider, otherwise every fetch returns no records.
pub async fn build_services(config: &AppConfig) -> Result<AppServices> {
    let source = build_source(config)?;
    let settings = config.search_settings();

    match &config.database_url {
        Some(url) => {
            let store = PostgresJobStore::connect(
                url,
                config.db_max_connections,
                config.db_acquire_timeout,
            )
            .await
            .context("failed to connect to Postgres")?;
            store
                .ensure_schema()
                .await
                .context("failed to create the jobs schema")?;
            info!(max_connections = config.db_max_connections, "using Postgres job store");
            Ok(AppServices::persistent(
                store,
                source,
                config.source_retry,
                settings,
            ))
        }
        None => {
            warn!("DATABASE_URL not set; using in-memory job store");
            Ok(AppServices::in_memory(
                InMemoryJobStore::new(),
                source,
                config.source_retry,
                settings,
            ))
        }
    }
}

fn build_source(config: &AppConfig) -> Result<SharedJobSource> {
    match &config.job_source_url {
        Some(url) => {
            let source = HttpJobSource::new(url, config.job_source_timeout)
                .context("failed to build the job source client")?;
            info!(endpoint = source.endpoint(), "using HTTP job source");
            Ok(Arc::new(source))
        }
        None => {
            warn!("JOB_SOURCE_URL not set; searches will only return stored jobs");
            Ok(Arc::new(ScriptedJobSource::new()))
        }
    }
}
