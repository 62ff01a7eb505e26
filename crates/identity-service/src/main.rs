//! Identity Service
//!
//! Validates bearer credentials for resource services and publishes
//! validation events to the auth events channel.

use common::channel::amqp::{AmqpEventPublisher, AmqpSettings};
use common::channel::EventPublisher;
use common::credential::CredentialCodec;
use common::secret::SecretString;
use identity_service::config::Config;
use identity_service::observability::init_metrics_recorder;
use identity_service::routes::{self, AppState};
use identity_service::services::ValidationService;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Upper bound on waiting for background publishes at shutdown.
const PUBLISH_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "identity_service=debug,common=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Identity Service");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.bind_address,
        auth_events_queue = %config.auth_events_queue,
        clock_skew_seconds = config.clock_skew_seconds,
        credential_secret_len = config.credential_secret_len(),
        "Configuration loaded successfully"
    );

    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics recorder: {}", e);
        e
    })?;

    // Safe cast: validated positive by Config
    #[allow(clippy::cast_sign_loss)]
    let clock_skew = Duration::from_secs(config.clock_skew_seconds as u64);
    let codec = CredentialCodec::new(&config.credential_secret, clock_skew);

    let publisher = Arc::new(
        AmqpEventPublisher::connect(AmqpSettings::new(
            SecretString::clone(&config.amqp_url),
            config.auth_events_queue.clone(),
        ))
        .await,
    );

    let validation = Arc::new(ValidationService::new(codec, publisher.clone()));

    let bind_address = config.bind_address.clone();

    let state = Arc::new(AppState {
        validation: Arc::clone(&validation),
    });

    let app = routes::build_routes(state, metrics_handle);

    let addr: SocketAddr = bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    info!("Identity Service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!(
        pending = validation.pending_publishes(),
        "Draining background event publishes"
    );
    if !validation.drain(PUBLISH_DRAIN_TIMEOUT).await {
        warn!(
            pending = validation.pending_publishes(),
            "Publish drain timed out, remaining events are dropped"
        );
    }

    publisher.close().await;

    info!("Identity Service shutdown complete");

    Ok(())
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
