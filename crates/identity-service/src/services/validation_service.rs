//! Credential validation service.
//!
//! Decodes a raw credential and, when it is valid, hands a `token_validated`
//! event to the auth events channel on a background task. The caller gets
//! its answer as soon as decoding finishes; the publish never delays or
//! changes that answer.
//!
//! Background publishes are tracked so shutdown can wait for them to drain
//! before the broker connection is closed. At most
//! [`MAX_IN_FLIGHT_PUBLISHES`] run at once; past that, events are dropped
//! and logged.

use crate::observability::metrics::{record_event_publish, record_validation};
use common::channel::EventPublisher;
use common::credential::CredentialCodec;
use common::error::AuthError;
use common::events::AuthEvent;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;
use tracing::instrument;

/// Upper bound on background publishes running at once.
pub const MAX_IN_FLIGHT_PUBLISHES: usize = 1024;

/// Validates credentials and emits validation events.
pub struct ValidationService {
    codec: CredentialCodec,
    publisher: Arc<dyn EventPublisher>,
    publishes: TaskTracker,
    publish_permits: Arc<Semaphore>,
}

impl ValidationService {
    pub fn new(codec: CredentialCodec, publisher: Arc<dyn EventPublisher>) -> Self {
        Self::with_publish_limit(codec, publisher, MAX_IN_FLIGHT_PUBLISHES)
    }

    /// Create a service allowing at most `max_in_flight` background publishes.
    pub fn with_publish_limit(
        codec: CredentialCodec,
        publisher: Arc<dyn EventPublisher>,
        max_in_flight: usize,
    ) -> Self {
        Self {
            codec,
            publisher,
            publishes: TaskTracker::new(),
            publish_permits: Arc::new(Semaphore::new(max_in_flight)),
        }
    }

    /// Validate a raw credential.
    ///
    /// On success returns the subject id and schedules exactly one
    /// `token_validated` event. Rejections schedule nothing.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::CredentialMissing` for an empty credential, or the
    /// `AuthError` matching the decode outcome.
    #[instrument(skip_all, name = "identity.services.validation")]
    pub fn validate(&self, raw_credential: &str) -> Result<String, AuthError> {
        if raw_credential.is_empty() {
            return Err(AuthError::CredentialMissing);
        }

        let start = Instant::now();
        let outcome = self.codec.decode(raw_credential);
        record_validation(outcome.label(), start.elapsed());

        let subject_id = outcome.into_result().map_err(|e| {
            tracing::debug!(
                target: "identity.services.validation",
                reason = e.reason_code(),
                "Credential rejected"
            );
            e
        })?;

        self.publish_validated(&subject_id);

        Ok(subject_id)
    }

    /// Fire-and-forget publish of a `token_validated` event.
    fn publish_validated(&self, subject_id: &str) {
        let Ok(permit) = Arc::clone(&self.publish_permits).try_acquire_owned() else {
            record_event_publish("dropped");
            tracing::warn!(
                target: "identity.services.validation",
                max_in_flight = MAX_IN_FLIGHT_PUBLISHES,
                "Too many auth event publishes in flight, dropping event"
            );
            return;
        };

        let publisher = Arc::clone(&self.publisher);
        let event = AuthEvent::token_validated(subject_id);

        self.publishes.spawn(async move {
            let _permit = permit;
            match publisher.publish(&event).await {
                Ok(()) => {
                    record_event_publish("success");
                    tracing::debug!(
                        target: "identity.services.validation",
                        "Auth event published"
                    );
                }
                Err(e) => {
                    record_event_publish("error");
                    tracing::warn!(
                        target: "identity.services.validation",
                        error = %e,
                        "Failed to publish auth event, cache confirmation will be missing"
                    );
                }
            }
        });
    }

    /// Number of background publishes still running.
    pub fn pending_publishes(&self) -> usize {
        self.publishes.len()
    }

    /// Wait for in-flight publishes to finish, up to `timeout`.
    ///
    /// Returns `true` if every publish finished in time.
    pub async fn drain(&self, timeout: Duration) -> bool {
        self.publishes.close();
        let drained = tokio::time::timeout(timeout, self.publishes.wait())
            .await
            .is_ok();
        self.publishes.reopen();
        drained
    }
}
