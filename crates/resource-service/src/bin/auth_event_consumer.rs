//! Auth Event Consumer
//!
//! Standalone worker that drains the auth events queue into the
//! confirmation cache. Run any number of instances against the same queue;
//! they compete for deliveries. Requires `REDIS_URL` to be useful, since the
//! in-process cache is invisible to other processes.

use resource_service::bootstrap::{amqp_consumer, init_tracing, open_cache, shutdown_signal};
use resource_service::config::Config;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing("resource_service=debug,common=info");

    info!("Starting Auth Event Consumer");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    if config.redis_url.is_none() {
        warn!("REDIS_URL not set, confirmations will not be visible to resource-service");
    }

    let cache = open_cache(&config).await?;
    let consumer = amqp_consumer(&config, cache);

    let shutdown_token = CancellationToken::new();
    let handle = tokio::spawn(consumer.run(shutdown_token.clone()));

    shutdown_signal().await;
    shutdown_token.cancel();

    handle.await?;

    info!("Auth Event Consumer shutdown complete");

    Ok(())
}
