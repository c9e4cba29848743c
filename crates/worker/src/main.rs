//! News worker entry point
//!
//! Consumes `news.created` events from RabbitMQ and projects them into the
//! Elasticsearch articles index. Exits 0 on interrupt, non-zero when a
//! backing service is unreachable at startup.

mod container;

use anyhow::Context;
use infrastructure::{WorkerConfig, init_logging};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before the config reads the environment
    let _ = dotenvy::dotenv();

    let config = WorkerConfig::load().context("invalid configuration")?;
    init_logging(config.log_level);

    info!("Starting news worker v{}", env!("CARGO_PKG_VERSION"));

    let container = container::build(&config).await?;

    container.consumer.run(shutdown_signal()).await?;

    info!("Worker stopped cleanly");
    Ok(())
}

/// Resolves when the process receives an interrupt signal
async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "Failed to listen for shutdown signal");
    }
}
