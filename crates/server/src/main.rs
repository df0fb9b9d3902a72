//! swrouter server entry point.
//!
//! Boots the service worker and serves it as an MCP server on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::{Context, Result};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use swrouter_client::{FetchConfig, HttpFetcher, ServiceWorker, WorkerConfig};
use swrouter_core::{AppConfig, CacheDb};
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load().context("failed to load configuration")?;
    tracing::info!(
        version = %config.version,
        scope = %config.scope,
        db_path = %config.db_path.display(),
        "Starting swrouter server on stdio transport"
    );

    let cache = CacheDb::open(&config.db_path)
        .await
        .with_context(|| format!("failed to open cache at {}", config.db_path.display()))?;
    let fetcher = HttpFetcher::new(FetchConfig::from_app(&config))?;
    let worker = ServiceWorker::new(WorkerConfig::from_app(&config)?, cache, Arc::new(fetcher))?;

    let handler = handler::SwRouterServer::new(Arc::new(worker));
    handler.bootstrap().await;

    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
