//! Metrics definitions for the identity service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `identity_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize the Prometheus recorder and return the handle used by `/metrics`.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("identity_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.150, 0.200, 0.300, 0.500, 1.000, 2.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        // Decoding is pure CPU work, expected well under a millisecond
        .set_buckets_for_metric(
            Matcher::Prefix("identity_validation".to_string()),
            &[0.0001, 0.0005, 0.001, 0.002, 0.005, 0.010, 0.050],
        )
        .map_err(|e| format!("Failed to set validation buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `identity_http_requests_total`, `identity_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("identity_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("identity_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

fn normalize_endpoint(path: &str) -> &'static str {
    match path {
        "/v1/auth/validate" => "/v1/auth/validate",
        "/v1/health" => "/v1/health",
        "/metrics" => "/metrics",
        _ => "/other",
    }
}

// ============================================================================
// Validation Metrics
// ============================================================================

/// Record a credential decode
///
/// Metric: `identity_validations_total`, `identity_validation_duration_seconds`
/// Labels: `outcome`
pub fn record_validation(outcome: &'static str, duration: Duration) {
    histogram!("identity_validation_duration_seconds").record(duration.as_secs_f64());

    counter!("identity_validations_total",
        "outcome" => outcome
    )
    .increment(1);
}

/// Record a background auth event publish
///
/// Metric: `identity_auth_events_published_total`
/// Labels: `status`
pub fn record_event_publish(status: &'static str) {
    counter!("identity_auth_events_published_total",
        "status" => status
    )
    .increment(1);
}
