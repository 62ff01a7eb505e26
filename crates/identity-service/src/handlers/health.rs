//! Health check handler.

use axum::Json;
use serde::Serialize;
use tracing::instrument;

/// Liveness response body.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
}

/// Liveness probe.
///
/// Does not probe the broker. Validation keeps working while the auth
/// events channel is down.
#[instrument(skip_all, name = "identity.health.check")]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "identity-service",
    })
}
