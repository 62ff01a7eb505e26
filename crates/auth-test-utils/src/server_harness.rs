//! Test server harnesses for E2E testing
//!
//! Spawn real identity and resource service instances on random local
//! ports. The auth events channel is a [`MemoryChannel`] the test keeps a
//! handle to, so it can inspect published events, inject raw messages or
//! simulate broker outages.

use crate::token_builders::TEST_SECRET;
use common::channel::memory::MemoryChannel;
use common::credential::CredentialCodec;
use identity_service::services::ValidationService;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use resource_service::auth::ValidationClient;
use resource_service::cache::ConfirmationCache;
use resource_service::middleware::AuthState;
use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Standalone recorder handle; never installed globally so tests can run
/// in parallel within one process.
fn test_metrics_handle() -> PrometheusHandle {
    PrometheusBuilder::new().build_recorder().handle()
}

async fn serve(app: axum::Router) -> Result<(SocketAddr, JoinHandle<()>), anyhow::Error> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

    let addr = listener
        .local_addr()
        .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            eprintln!("Test server error: {}", e);
        }
    });

    Ok((addr, handle))
}

/// Test harness for the identity service
///
/// # Example
/// ```rust,ignore
/// let channel = MemoryChannel::new();
/// let server = TestIdentityServer::spawn(channel.clone()).await?;
///
/// // ... call POST {server.url()}/v1/auth/validate ...
///
/// server.validation().drain(Duration::from_secs(1)).await;
/// assert_eq!(channel.published_events().len(), 1);
/// ```
pub struct TestIdentityServer {
    addr: SocketAddr,
    channel: MemoryChannel,
    validation: Arc<ValidationService>,
    _handle: JoinHandle<()>,
}

impl TestIdentityServer {
    /// Spawn an identity service publishing to `channel`, verifying
    /// credentials signed with [`TEST_SECRET`].
    pub async fn spawn(channel: MemoryChannel) -> Result<Self, anyhow::Error> {
        let config = identity_service::config::Config::from_vars(&HashMap::from([
            ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
            ("CREDENTIAL_SECRET".to_string(), TEST_SECRET.to_string()),
            ("AMQP_URL".to_string(), "amqp://unused".to_string()),
        ]))?;

        let codec = CredentialCodec::new(
            &config.credential_secret,
            Duration::from_secs(config.clock_skew_seconds.unsigned_abs()),
        );
        let validation = Arc::new(ValidationService::new(codec, Arc::new(channel.clone())));

        let state = Arc::new(identity_service::routes::AppState {
            validation: Arc::clone(&validation),
        });

        let app = identity_service::routes::build_routes(state, test_metrics_handle());
        let (addr, handle) = serve(app).await?;

        Ok(Self {
            addr,
            channel,
            validation,
            _handle: handle,
        })
    }

    /// Get the base URL of the test server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// The channel events are published to.
    pub fn channel(&self) -> &MemoryChannel {
        &self.channel
    }

    /// The validation service behind the server, for draining publishes.
    pub fn validation(&self) -> &Arc<ValidationService> {
        &self.validation
    }
}

impl Drop for TestIdentityServer {
    fn drop(&mut self) {
        self._handle.abort();
    }
}

/// Test harness for the resource service
///
/// The auth event consumer is not started; tests that need it run
/// `AuthEventConsumer` themselves against the same cache.
pub struct TestResourceServer {
    addr: SocketAddr,
    client: Arc<ValidationClient>,
    cache: Arc<dyn ConfirmationCache>,
    _handle: JoinHandle<()>,
}

impl TestResourceServer {
    /// Spawn a resource service that authenticates against `identity_url`.
    pub async fn spawn(
        identity_url: &str,
        cache: Arc<dyn ConfirmationCache>,
    ) -> Result<Self, anyhow::Error> {
        Self::spawn_with_vars(identity_url, cache, HashMap::new()).await
    }

    /// Like [`TestResourceServer::spawn`], with extra configuration variables
    /// (for example `VALIDATION_TIMEOUT_MS`).
    pub async fn spawn_with_vars(
        identity_url: &str,
        cache: Arc<dyn ConfirmationCache>,
        extra_vars: HashMap<String, String>,
    ) -> Result<Self, anyhow::Error> {
        let mut vars = HashMap::from([
            ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
            ("IDENTITY_SERVICE_URL".to_string(), identity_url.to_string()),
            ("AMQP_URL".to_string(), "amqp://unused".to_string()),
            ("CONSUMER_ENABLED".to_string(), "false".to_string()),
        ]);
        vars.extend(extra_vars);

        let config = resource_service::config::Config::from_vars(&vars)?;
        let client = Arc::new(
            resource_service::bootstrap::validation_client(&config)
                .map_err(|e| anyhow::anyhow!("Failed to build validation client: {}", e))?,
        );

        let state = Arc::new(resource_service::routes::AppState {
            cache: Arc::clone(&cache),
        });
        let auth_state = Arc::new(AuthState {
            client: Arc::clone(&client),
        });

        let app =
            resource_service::routes::build_routes(state, auth_state, test_metrics_handle());
        let (addr, handle) = serve(app).await?;

        Ok(Self {
            addr,
            client,
            cache,
            _handle: handle,
        })
    }

    /// Get the base URL of the test server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// The validation client used by the auth middleware.
    pub fn client(&self) -> &Arc<ValidationClient> {
        &self.client
    }

    /// The confirmation cache the server reads.
    pub fn cache(&self) -> &Arc<dyn ConfirmationCache> {
        &self.cache
    }
}

impl Drop for TestResourceServer {
    fn drop(&mut self) {
        self._handle.abort();
    }
}

/// Poll `condition` every 10ms until it returns `true` or `timeout` passes.
///
/// Returns whether the condition was met.
pub async fn wait_until<F, Fut>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
