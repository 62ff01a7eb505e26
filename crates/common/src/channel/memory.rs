//! In-process auth events channel.
//!
//! Mirrors the broker semantics the services rely on: competing consumers,
//! explicit ack/reject, unsettled deliveries returned to the queue (flagged
//! redelivered) when their session ends, and a dead-letter count for
//! rejections without requeue. The channel can be toggled unavailable or
//! force-disconnected to exercise failure paths.

use super::{Delivery, EventConnector, EventPublisher, EventSource};
use crate::error::AuthError;
use crate::events::AuthEvent;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Debug, Clone)]
struct QueuedMessage {
    body: Vec<u8>,
    redelivered: bool,
}

#[derive(Debug, Default)]
struct State {
    queue: VecDeque<QueuedMessage>,
    next_tag: u64,
    generation: u64,
    unavailable: bool,
    published: Vec<AuthEvent>,
    acked: usize,
    dead_lettered: usize,
}

#[derive(Debug, Default)]
struct Inner {
    state: Mutex<State>,
    notify: Notify,
}

/// Shared in-memory channel. Clones share the same queue.
#[derive(Debug, Clone, Default)]
pub struct MemoryChannel {
    inner: Arc<Inner>,
}

impl MemoryChannel {
    /// Create an empty, available channel.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make publish and connect fail (or succeed again).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.state.lock().unavailable = unavailable;
    }

    /// Break every open consumer session, as a dropped broker connection would.
    pub fn disconnect(&self) {
        self.inner.state.lock().generation += 1;
        self.inner.notify.notify_waiters();
    }

    /// Enqueue a raw body, bypassing encoding and availability.
    pub fn publish_raw(&self, body: impl Into<Vec<u8>>) {
        self.inner.state.lock().queue.push_back(QueuedMessage {
            body: body.into(),
            redelivered: false,
        });
        self.inner.notify.notify_one();
    }

    /// Events accepted by [`EventPublisher::publish`], in order.
    #[must_use]
    pub fn published_events(&self) -> Vec<AuthEvent> {
        self.inner.state.lock().published.clone()
    }

    /// Messages waiting for a consumer.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    /// Deliveries acknowledged by consumers.
    #[must_use]
    pub fn acked_count(&self) -> usize {
        self.inner.state.lock().acked
    }

    /// Deliveries rejected without requeue.
    #[must_use]
    pub fn dead_lettered_count(&self) -> usize {
        self.inner.state.lock().dead_lettered
    }
}

#[async_trait]
impl EventPublisher for MemoryChannel {
    async fn publish(&self, event: &AuthEvent) -> Result<(), AuthError> {
        let body = event
            .encode()
            .map_err(|e| AuthError::ChannelUnavailable(format!("encode event: {e}")))?;

        {
            let mut state = self.inner.state.lock();
            if state.unavailable {
                return Err(AuthError::ChannelUnavailable(
                    "memory channel unavailable".to_string(),
                ));
            }
            state.queue.push_back(QueuedMessage {
                body,
                redelivered: false,
            });
            state.published.push(event.clone());
        }

        self.inner.notify.notify_one();
        Ok(())
    }
}

#[async_trait]
impl EventConnector for MemoryChannel {
    async fn connect(&self) -> Result<Box<dyn EventSource>, AuthError> {
        let state = self.inner.state.lock();
        if state.unavailable {
            return Err(AuthError::ChannelUnavailable(
                "memory channel unavailable".to_string(),
            ));
        }

        Ok(Box::new(MemoryEventSource {
            inner: Arc::clone(&self.inner),
            generation: state.generation,
            in_flight: HashMap::new(),
        }))
    }
}

/// A consumer session on a [`MemoryChannel`].
#[derive(Debug)]
pub struct MemoryEventSource {
    inner: Arc<Inner>,
    generation: u64,
    in_flight: HashMap<u64, QueuedMessage>,
}

impl MemoryEventSource {
    fn check_connected(&self, state: &State) -> Result<(), AuthError> {
        if state.generation == self.generation {
            Ok(())
        } else {
            Err(AuthError::ChannelUnavailable("connection lost".to_string()))
        }
    }

    /// Return unsettled deliveries to the front of the queue.
    fn release_in_flight(&mut self) {
        if self.in_flight.is_empty() {
            return;
        }

        let mut released: Vec<(u64, QueuedMessage)> = self.in_flight.drain().collect();
        released.sort_by_key(|(tag, _)| *tag);

        {
            let mut state = self.inner.state.lock();
            for (_, mut message) in released.into_iter().rev() {
                message.redelivered = true;
                state.queue.push_front(message);
            }
        }
        self.inner.notify.notify_waiters();
        self.inner.notify.notify_one();
    }
}

#[async_trait]
impl EventSource for MemoryEventSource {
    async fn next_delivery(&mut self) -> Result<Option<Delivery>, AuthError> {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            // Register before checking so a wakeup between check and await is not lost
            notified.as_mut().enable();

            {
                let mut state = self.inner.state.lock();
                self.check_connected(&state)?;

                if let Some(message) = state.queue.pop_front() {
                    state.next_tag += 1;
                    let delivery_tag = state.next_tag;
                    let delivery = Delivery {
                        delivery_tag,
                        body: message.body.clone(),
                        redelivered: message.redelivered,
                    };
                    self.in_flight.insert(delivery_tag, message);
                    return Ok(Some(delivery));
                }
            }

            notified.await;
        }
    }

    async fn ack(&mut self, delivery_tag: u64) -> Result<(), AuthError> {
        let mut state = self.inner.state.lock();
        self.check_connected(&state)?;

        if self.in_flight.remove(&delivery_tag).is_none() {
            return Err(AuthError::ChannelUnavailable(format!(
                "unknown delivery tag {delivery_tag}"
            )));
        }
        state.acked += 1;
        Ok(())
    }

    async fn reject(&mut self, delivery_tag: u64, requeue: bool) -> Result<(), AuthError> {
        {
            let mut state = self.inner.state.lock();
            self.check_connected(&state)?;

            let Some(mut message) = self.in_flight.remove(&delivery_tag) else {
                return Err(AuthError::ChannelUnavailable(format!(
                    "unknown delivery tag {delivery_tag}"
                )));
            };

            if requeue {
                message.redelivered = true;
                state.queue.push_back(message);
            } else {
                state.dead_lettered += 1;
            }
        }

        if requeue {
            self.inner.notify.notify_one();
        }
        Ok(())
    }

    async fn close(&mut self) {
        self.release_in_flight();
    }
}

impl Drop for MemoryEventSource {
    fn drop(&mut self) {
        self.release_in_flight();
    }
}
