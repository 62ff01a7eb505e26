//! Process wiring shared by the `resource-service` and
//! `auth-event-consumer` binaries.

use crate::auth::{CircuitBreakerConfig, ValidationClient};
use crate::cache::{
    CacheError, ConfirmationCache, MemoryConfirmationCache, RedisConfirmationCache,
};
use crate::config::Config;
use crate::errors::ResourceError;
use crate::tasks::AuthEventConsumer;
use common::channel::amqp::{AmqpEventConnector, AmqpSettings};
use common::secret::SecretString;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global tracing subscriber. `RUST_LOG` overrides `default_filter`.
pub fn init_tracing(default_filter: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Open the confirmation cache selected by configuration.
///
/// # Errors
///
/// Returns `CacheError::Backend` if Redis is configured but unreachable.
pub async fn open_cache(config: &Config) -> Result<Arc<dyn ConfirmationCache>, CacheError> {
    match &config.redis_url {
        Some(redis_url) => Ok(Arc::new(RedisConfirmationCache::connect(redis_url).await?)),
        None => {
            warn!(
                target: "resource.bootstrap",
                "REDIS_URL not set, confirmation cache is local to this process"
            );
            Ok(Arc::new(MemoryConfirmationCache::new()))
        }
    }
}

/// Build the validation client from configuration.
///
/// # Errors
///
/// Returns `ResourceError::Internal` if the HTTP client cannot be built.
pub fn validation_client(config: &Config) -> Result<ValidationClient, ResourceError> {
    ValidationClient::new(
        &config.identity_service_url,
        Duration::from_millis(config.validation_timeout_ms),
        CircuitBreakerConfig {
            failure_threshold: config.circuit_breaker_failure_threshold,
            recovery_timeout: Duration::from_secs(config.circuit_breaker_recovery_seconds),
        },
    )
}

/// Build an auth event consumer bound to the configured AMQP queue.
pub fn amqp_consumer(config: &Config, cache: Arc<dyn ConfirmationCache>) -> AuthEventConsumer {
    let connector = AmqpEventConnector::new(AmqpSettings {
        prefetch: config.consumer_prefetch,
        ..AmqpSettings::new(
            SecretString::clone(&config.amqp_url),
            config.auth_events_queue.clone(),
        )
    });

    info!(
        target: "resource.bootstrap",
        queue = %config.auth_events_queue,
        prefetch = config.consumer_prefetch,
        "Auth event consumer configured"
    );

    AuthEventConsumer::new(
        Arc::new(connector),
        cache,
        Duration::from_secs(config.cache_ttl_seconds),
    )
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
pub async fn shutdown_signal() {
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

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config() -> Config {
        Config::from_vars(&HashMap::from([(
            "AMQP_URL".to_string(),
            "amqp://localhost".to_string(),
        )]))
        .unwrap()
    }

    #[tokio::test]
    async fn test_memory_cache_without_redis_url() {
        let cache = open_cache(&config()).await.unwrap();
        cache.set("U1", true, Duration::from_secs(1)).await.unwrap();
        assert!(cache.get("U1").await.unwrap().is_some());
    }

    #[test]
    fn test_validation_client_from_defaults() {
        let client = validation_client(&config()).unwrap();
        assert_eq!(client.circuit_breaker().state().label(), "closed");
    }
}
