//! HTTP request handlers for the resource service.

pub mod health;
pub mod me;
pub mod metrics;

pub use health::health_check;
pub use me::current_subject;
pub use metrics::metrics_handler;
