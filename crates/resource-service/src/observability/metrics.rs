//! Metrics definitions for the resource service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `resource_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms

use metrics::{counter, gauge, histogram};
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
            Matcher::Prefix("resource_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        // Upper buckets cover the validation timeout
        .set_buckets_for_metric(
            Matcher::Prefix("resource_validation_call".to_string()),
            &[
                0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.500, 1.000, 5.000, 10.000,
            ],
        )
        .map_err(|e| format!("Failed to set validation call buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `resource_http_requests_total`, `resource_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("resource_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("resource_http_requests_total",
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
        "/v1/me" => "/v1/me",
        "/v1/health" => "/v1/health",
        "/metrics" => "/metrics",
        _ => "/other",
    }
}

// ============================================================================
// Validation Client Metrics
// ============================================================================

/// Record one authentication attempt against the identity service
///
/// Metric: `resource_validation_calls_total`, `resource_validation_call_duration_seconds`
/// Labels: `result` (authenticated, rejected, upstream_error, circuit_open, no_credential)
pub fn record_validation_call(result: &'static str, duration: Duration) {
    // Calls that never left the process have no meaningful latency
    if !matches!(result, "circuit_open" | "no_credential") {
        histogram!("resource_validation_call_duration_seconds",
            "result" => result
        )
        .record(duration.as_secs_f64());
    }

    counter!("resource_validation_calls_total",
        "result" => result
    )
    .increment(1);
}

/// Record the validation client circuit state
///
/// Metric: `resource_circuit_breaker_state` (0 closed, 1 half open, 2 open)
pub fn record_circuit_state(state: &'static str) {
    let value = match state {
        "closed" => 0.0,
        "half_open" => 1.0,
        _ => 2.0,
    };
    gauge!("resource_circuit_breaker_state").set(value);
}

// ============================================================================
// Consumer Metrics
// ============================================================================

/// Record how a delivery was settled
///
/// Metric: `resource_consumer_deliveries_total`
/// Labels: `disposition` (ack, dead_letter, requeue)
pub fn record_consumer_delivery(disposition: &'static str) {
    counter!("resource_consumer_deliveries_total",
        "disposition" => disposition
    )
    .increment(1);
}

/// Record a consumer session attempt
///
/// Metric: `resource_consumer_sessions_total`
/// Labels: `status` (connected, connect_failed)
pub fn record_consumer_session(status: &'static str) {
    counter!("resource_consumer_sessions_total",
        "status" => status
    )
    .increment(1);
}

/// Record a confirmation cache write
///
/// Metric: `resource_cache_writes_total`
/// Labels: `status`
pub fn record_cache_write(status: &'static str) {
    counter!("resource_cache_writes_total",
        "status" => status
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_functions_without_recorder() {
        record_http_request("GET", "/v1/me", 200, Duration::from_millis(12));
        record_validation_call("authenticated", Duration::from_millis(8));
        record_validation_call("circuit_open", Duration::ZERO);
        record_circuit_state("open");
        record_consumer_delivery("ack");
        record_consumer_session("connected");
        record_cache_write("error");
    }

    #[test]
    fn test_normalize_endpoint() {
        assert_eq!(normalize_endpoint("/v1/me"), "/v1/me");
        assert_eq!(normalize_endpoint("/v1/health"), "/v1/health");
        assert_eq!(normalize_endpoint("/v1/me/extra"), "/other");
    }

    #[test]
    fn test_categorize_status_code() {
        assert_eq!(categorize_status_code(204), "success");
        assert_eq!(categorize_status_code(401), "error");
        assert_eq!(categorize_status_code(408), "timeout");
    }
}
