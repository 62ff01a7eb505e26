//! Observability for the identity service.
//!
//! Metric labels are bounded:
//! - `outcome`: 4 values (valid, expired, malformed, signature_invalid)
//! - `status`: success or error
//! - `endpoint`: known routes, everything else is `/other`

pub mod metrics;

pub use metrics::{init_metrics_recorder, record_event_publish, record_http_request, record_validation};
