//! Auth event consumer task.
//!
//! Drains the auth events queue and writes a confirmation entry per
//! `token_validated` event. A delivery is acknowledged only after its cache
//! write succeeds, so every event is applied at least once. Re-applying an
//! event rewrites the same key with a fresh TTL, which is harmless.
//!
//! # Delivery handling
//!
//! | Outcome | Settlement | Session |
//! |---|---|---|
//! | cache write succeeded | ack | continues |
//! | body does not decode | reject, no requeue | continues |
//! | cache write failed | reject, requeue | ends, reconnect after backoff |
//!
//! # Supervision
//!
//! Connection loss does not stop the task. It reconnects with exponential
//! backoff (1s doubling to 60s), resetting after each successful connect.
//! Events published while no consumer is bound stay in the durable queue.
//!
//! # Graceful Shutdown
//!
//! The cancellation token is checked between deliveries. A delivery being
//! handled finishes and is settled first; the session is then closed.

use crate::cache::ConfirmationCache;
use crate::observability::metrics::{
    record_cache_write, record_consumer_delivery, record_consumer_session,
};
use common::channel::{Delivery, EventConnector, EventSource};
use common::error::AuthError;
use common::events::AuthEvent;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// First reconnect delay.
pub const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Reconnect delay ceiling.
pub const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// How a delivery is settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Applied; acknowledge.
    Ack,
    /// Can never be applied; reject without requeue.
    DeadLetter,
    /// Could not be applied now; reject with requeue and end the session.
    Requeue,
}

impl Disposition {
    pub fn label(self) -> &'static str {
        match self {
            Disposition::Ack => "ack",
            Disposition::DeadLetter => "dead_letter",
            Disposition::Requeue => "requeue",
        }
    }
}

/// Why a consumer session ended.
#[derive(Debug)]
enum SessionEnd {
    Cancelled,
    ClosedByBroker,
    Failed(AuthError),
    CacheUnavailable,
}

/// Consumer that keeps the confirmation cache fed from the auth events queue.
pub struct AuthEventConsumer {
    connector: Arc<dyn EventConnector>,
    cache: Arc<dyn ConfirmationCache>,
    ttl: Duration,
}

impl AuthEventConsumer {
    pub fn new(
        connector: Arc<dyn EventConnector>,
        cache: Arc<dyn ConfirmationCache>,
        ttl: Duration,
    ) -> Self {
        Self {
            connector,
            cache,
            ttl,
        }
    }

    /// Run until `cancel_token` is triggered.
    #[instrument(skip_all, name = "resource.task.consumer")]
    pub async fn run(self, cancel_token: CancellationToken) {
        info!(
            target: "resource.task.consumer",
            ttl_seconds = self.ttl.as_secs(),
            "Starting auth event consumer"
        );

        let mut backoff = INITIAL_BACKOFF;

        loop {
            let connected = tokio::select! {
                result = self.connector.connect() => result,
                () = cancel_token.cancelled() => break,
            };

            match connected {
                Ok(mut source) => {
                    record_consumer_session("connected");
                    info!(target: "resource.task.consumer", "Consumer session established");
                    backoff = INITIAL_BACKOFF;

                    let end = self.consume(source.as_mut(), &cancel_token).await;
                    source.close().await;

                    match end {
                        SessionEnd::Cancelled => break,
                        SessionEnd::ClosedByBroker => {
                            warn!(target: "resource.task.consumer", "Broker closed consumer session");
                        }
                        SessionEnd::Failed(e) => {
                            warn!(target: "resource.task.consumer", error = %e, "Consumer session lost");
                        }
                        SessionEnd::CacheUnavailable => {
                            warn!(
                                target: "resource.task.consumer",
                                "Confirmation cache unavailable, pausing consumption"
                            );
                        }
                    }
                }
                Err(e) => {
                    record_consumer_session("connect_failed");
                    warn!(
                        target: "resource.task.consumer",
                        error = %e,
                        retry_in_secs = backoff.as_secs(),
                        "Failed to open consumer session"
                    );
                }
            }

            tokio::select! {
                () = tokio::time::sleep(backoff) => {}
                () = cancel_token.cancelled() => break,
            }
            backoff = next_backoff(backoff);
        }

        info!(target: "resource.task.consumer", "Auth event consumer stopped");
    }

    async fn consume(
        &self,
        source: &mut dyn EventSource,
        cancel_token: &CancellationToken,
    ) -> SessionEnd {
        loop {
            let next = tokio::select! {
                biased;
                () = cancel_token.cancelled() => return SessionEnd::Cancelled,
                next = source.next_delivery() => next,
            };

            let delivery = match next {
                Ok(Some(delivery)) => delivery,
                Ok(None) => return SessionEnd::ClosedByBroker,
                Err(e) => return SessionEnd::Failed(e),
            };

            let disposition = self.handle_delivery(&delivery).await;
            record_consumer_delivery(disposition.label());

            let settled = match disposition {
                Disposition::Ack => source.ack(delivery.delivery_tag).await,
                Disposition::DeadLetter => source.reject(delivery.delivery_tag, false).await,
                Disposition::Requeue => source.reject(delivery.delivery_tag, true).await,
            };

            if let Err(e) = settled {
                return SessionEnd::Failed(e);
            }
            if disposition == Disposition::Requeue {
                return SessionEnd::CacheUnavailable;
            }
        }
    }

    /// Apply one delivery to the cache and decide how to settle it.
    pub async fn handle_delivery(&self, delivery: &Delivery) -> Disposition {
        let event = match AuthEvent::decode(&delivery.body) {
            Ok(event) => event,
            Err(e) => {
                warn!(
                    target: "resource.task.consumer",
                    error = %e,
                    delivery_tag = delivery.delivery_tag,
                    "Discarding undecodable auth event"
                );
                return Disposition::DeadLetter;
            }
        };

        match self.cache.set(&event.subject_id, true, self.ttl).await {
            Ok(()) => {
                record_cache_write("success");
                tracing::debug!(
                    target: "resource.task.consumer",
                    redelivered = delivery.redelivered,
                    "Confirmation cached"
                );
                Disposition::Ack
            }
            Err(e) => {
                record_cache_write("error");
                warn!(
                    target: "resource.task.consumer",
                    error = %e,
                    "Failed to write confirmation, returning event to queue"
                );
                Disposition::Requeue
            }
        }
    }
}

fn next_backoff(current: Duration) -> Duration {
    (current * 2).min(MAX_BACKOFF)
}
