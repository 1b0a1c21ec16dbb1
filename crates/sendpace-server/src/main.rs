//! Sendpace - delivery engine entry point

use anyhow::Result;
use sendpace_common::config::Config;
use sendpace_core::{Dispatcher, LogOnlyBlockDetection, ProviderClient, QueueProcessor};
use sendpace_storage::db::DatabasePool;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    info!("Starting Sendpace delivery engine...");

    // Load configuration
    let config = Config::load()?;

    // Initialize database
    let db_pool = DatabasePool::new(&config.database).await?;

    // Run migrations
    db_pool.migrate().await?;

    // Provider transport with a fixed per-request timeout
    let transport = Arc::new(ProviderClient::new(
        config.transport.base_url.clone(),
        Duration::from_secs(config.transport.timeout_secs),
    ));

    // Block-detection hook; the default only logs the signal
    let block_detection = Arc::new(LogOnlyBlockDetection);

    // Dispatcher: the library surface a request layer calls, also used by
    // the processor to promote scheduled messages
    let dispatcher = Arc::new(Dispatcher::new(db_pool.clone(), transport.clone()));

    // Queue processor sweep loop
    let processor = Arc::new(
        QueueProcessor::new(
            db_pool.clone(),
            transport,
            block_detection,
            dispatcher.clone(),
        )
        .with_batch_size(config.processor.batch_size)
        .with_poll_interval(config.processor.poll_interval_secs),
    );

    let processor_handle = {
        let processor = Arc::clone(&processor);
        tokio::spawn(async move {
            processor.run().await;
        })
    };

    info!("Sendpace is running (host: {})", config.server.hostname);

    // Run until interrupted
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, stopping");

    processor_handle.abort();

    Ok(())
}

/// Initialize logging
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();
}
