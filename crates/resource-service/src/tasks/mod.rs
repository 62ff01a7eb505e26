//! Background tasks for the resource service.

pub mod auth_event_consumer;

pub use auth_event_consumer::{AuthEventConsumer, Disposition};
