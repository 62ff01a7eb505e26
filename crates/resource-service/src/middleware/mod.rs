//! HTTP middleware for the resource service.

pub mod auth;
pub mod http_metrics;

pub use auth::{require_auth, AuthState, AuthenticatedSubject};
pub use http_metrics::http_metrics_middleware;
