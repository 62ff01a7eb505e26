//! Resource Service
//!
//! Serves protected resources, authenticating every request against the
//! identity service. Optionally runs the auth event consumer in-process.

use resource_service::bootstrap::{
    amqp_consumer, init_tracing, open_cache, shutdown_signal, validation_client,
};
use resource_service::config::Config;
use resource_service::middleware::AuthState;
use resource_service::observability::init_metrics_recorder;
use resource_service::routes::{self, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing("resource_service=debug,common=info,tower_http=debug");

    info!("Starting Resource Service");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.bind_address,
        identity_service_url = %config.identity_service_url,
        validation_timeout_ms = config.validation_timeout_ms,
        cache_ttl_seconds = config.cache_ttl_seconds,
        consumer_enabled = config.consumer_enabled,
        "Configuration loaded successfully"
    );

    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics recorder: {}", e);
        e
    })?;

    let cache = open_cache(&config).await?;
    let client = validation_client(&config)?;

    let shutdown_token = CancellationToken::new();

    let consumer_handle = if config.consumer_enabled {
        let consumer = amqp_consumer(&config, Arc::clone(&cache));
        Some(tokio::spawn(consumer.run(shutdown_token.child_token())))
    } else {
        info!("In-process auth event consumer disabled");
        None
    };

    let bind_address = config.bind_address.clone();

    let state = Arc::new(AppState { cache });
    let auth_state = Arc::new(AuthState {
        client: Arc::new(client),
    });

    let app = routes::build_routes(state, auth_state, metrics_handle);

    let addr: SocketAddr = bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    info!("Resource Service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    shutdown_token.cancel();
    if let Some(handle) = consumer_handle {
        info!("Waiting for auth event consumer to stop");
        if let Err(e) = handle.await {
            error!("Auth event consumer task failed: {}", e);
        }
    }

    info!("Resource Service shutdown complete");

    Ok(())
}
