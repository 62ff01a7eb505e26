//! Auth events channel.
//!
//! A durable, at-least-once queue between the identity service (publisher)
//! and any number of competing consumers. The traits here are the seam the
//! services depend on; [`amqp`] talks to a real broker and [`memory`] is an
//! in-process implementation with the same delivery semantics for tests and
//! single-process setups.
//!
//! Consumer sessions follow an explicit lifecycle: [`EventConnector::connect`]
//! opens a session, deliveries are pulled with [`EventSource::next_delivery`]
//! and settled with [`EventSource::ack`] or [`EventSource::reject`], and
//! [`EventSource::close`] releases the session.

pub mod amqp;
pub mod memory;

use crate::error::AuthError;
use crate::events::AuthEvent;
use async_trait::async_trait;

/// A message handed to a consumer, not yet settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Tag used to ack or reject this delivery on its session.
    pub delivery_tag: u64,
    /// Raw message body.
    pub body: Vec<u8>,
    /// Whether the broker has delivered this message before.
    pub redelivered: bool,
}

/// Publishes auth events to the channel.
///
/// Publishing returns once the broker has been handed the message; it never
/// waits for a consumer. Implementations do not retry.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a single event as a persistent message.
    async fn publish(&self, event: &AuthEvent) -> Result<(), AuthError>;

    /// Release broker resources. Publishing after close may reconnect.
    async fn close(&self) {}
}

/// Opens consumer sessions on the channel.
#[async_trait]
pub trait EventConnector: Send + Sync {
    /// Open a session bound to the auth events queue.
    async fn connect(&self) -> Result<Box<dyn EventSource>, AuthError>;
}

/// One consumer session.
///
/// Unsettled deliveries return to the queue when the session ends.
#[async_trait]
pub trait EventSource: Send {
    /// Wait for the next delivery. `Ok(None)` means the broker closed the session.
    async fn next_delivery(&mut self) -> Result<Option<Delivery>, AuthError>;

    /// Acknowledge a delivery; it will not be redelivered.
    async fn ack(&mut self, delivery_tag: u64) -> Result<(), AuthError>;

    /// Reject a delivery, optionally returning it to the queue.
    async fn reject(&mut self, delivery_tag: u64, requeue: bool) -> Result<(), AuthError>;

    /// Close the session.
    async fn close(&mut self);
}
