use std::sync::Arc;

use anyhow::Context;

use jobsearch_infra::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    jobsearch_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    let services = Arc::new(jobsearch_api::app::services::build_services(&config).await?);
    let app = jobsearch_api::app::build_app(services, &config.cors_allowed_origin);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
