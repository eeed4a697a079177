//! Job centre server.

use std::sync::Arc;

use clap::Parser;
use scheduler::JobScheduler;
use server::{ServerConfig, shutdown::shutdown_signal};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::parse();
    let scheduler = Arc::new(JobScheduler::new());

    let listener = server::bind(&config).await?;
    server::serve(listener, scheduler.clone(), &config, shutdown_signal()).await?;

    let stats = scheduler.stats().await;
    info!(
        "Exiting with {} job(s) ({} ready, {} assigned) in {} queue(s)",
        stats.total(),
        stats.ready(),
        stats.assigned(),
        stats.queues.len()
    );
    Ok(())
}
