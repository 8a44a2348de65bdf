use anyhow::Context;
use clap::Parser;
use pagesync_editor::MemoryStore;
use pagesync_workspace::{demo_page, PageRegistry, ServerConfig, WorkspaceServer};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::parse();
    let sync_config = config.sync_config().context("failed to load sync config")?;

    let registry = PageRegistry::new(sync_config, Arc::new(MemoryStore::new()));
    if config.seed_demo {
        registry.register(demo_page())?;
    }

    let server = WorkspaceServer::new(registry, config.base_url.clone());
    let app = server.router();

    let addr = format!("127.0.0.1:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    tracing::info!(%addr, base_url = %config.base_url, pages = ?server.registry().handles(), "pagesync host listening");
    axum::serve(listener, app).await?;

    Ok(())
}
