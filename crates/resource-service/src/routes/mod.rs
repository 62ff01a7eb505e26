//! HTTP routes for the resource service.
//!
//! Defines the Axum router and application state.

use crate::cache::ConfirmationCache;
use crate::handlers;
use crate::middleware::{http_metrics_middleware, require_auth, AuthState};
use axum::{middleware, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Advisory confirmation cache (read-only from handlers).
    pub cache: Arc<dyn ConfirmationCache>,
}

/// Build the application routes.
///
/// - `/v1/health` - Liveness probe (public)
/// - `/metrics` - Prometheus scrape endpoint (public)
/// - `/v1/me` - Authenticated caller identity (protected)
pub fn build_routes(
    state: Arc<AppState>,
    auth_state: Arc<AuthState>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let public_routes = Router::new().route("/v1/health", get(handlers::health_check));

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    let protected_routes = Router::new()
        .route("/v1/me", get(handlers::current_subject))
        .route_layer(middleware::from_fn_with_state(auth_state, require_auth))
        .with_state(state);

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. TraceLayer - Log request details
    // 3. http_metrics_middleware - Record ALL responses (outermost)
    public_routes
        .merge(metrics_routes)
        .merge(protected_routes)
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(http_metrics_middleware))
}
