//! Observability for the resource service.
//!
//! Metric labels are bounded and never carry subject ids or credentials.

pub mod metrics;

pub use metrics::init_metrics_recorder;
