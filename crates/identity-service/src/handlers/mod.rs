//! HTTP request handlers for the identity service.

pub mod health;
pub mod metrics;
pub mod validate;

pub use health::health_check;
pub use metrics::metrics_handler;
pub use validate::validate_credential;
