//! shellcache server entry point.
//!
//! Boots one worker version and serves its lifecycle and page-side operations
//! as MCP tools on stdio transport. Logging goes to stderr to avoid
//! interfering with the JSON-RPC protocol on stdout.

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use shellcache_client::{FetchClient, FetchConfig};
use shellcache_core::{AppConfig, CacheDb};
use tracing_subscriber::EnvFilter;

mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    let worker_config = config.worker_config()?;
    let db = CacheDb::open(&config.db_path).await?;
    let network = FetchClient::new(FetchConfig::from(&config))?;

    tracing::info!(
        origin = %worker_config.origin,
        generation = %worker_config.generations.static_name(),
        db_path = %config.db_path.display(),
        "Starting shellcache on stdio transport"
    );

    let handler = handler::ShellCacheServer::new(worker_config, db, network);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
