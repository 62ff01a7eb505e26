//! Integration tests for the auth event consumer
//!
//! Runs the real consumer loop against the in-memory channel and cache,
//! covering delivery settlement, redelivery, poison messages, broker
//! outages and cache outages.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use auth_test_utils::{wait_until, MemoryChannel};
use common::channel::EventPublisher;
use common::events::AuthEvent;
use resource_service::cache::{CacheEntry, CacheError, ConfirmationCache, MemoryConfirmationCache};
use resource_service::tasks::AuthEventConsumer;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const TTL: Duration = Duration::from_secs(300);
const WAIT: Duration = Duration::from_secs(5);

struct RunningConsumer {
    cancel_token: CancellationToken,
    handle: JoinHandle<()>,
}

impl RunningConsumer {
    fn start(channel: &MemoryChannel, cache: Arc<dyn ConfirmationCache>) -> Self {
        let cancel_token = CancellationToken::new();
        let consumer = AuthEventConsumer::new(Arc::new(channel.clone()), cache, TTL);
        let handle = tokio::spawn(consumer.run(cancel_token.clone()));
        Self {
            cancel_token,
            handle,
        }
    }

    async fn stop(self) {
        self.cancel_token.cancel();
        tokio::time::timeout(Duration::from_secs(1), self.handle)
            .await
            .expect("consumer should stop promptly")
            .expect("consumer task should not panic");
    }
}

async fn is_confirmed(cache: &MemoryConfirmationCache, subject_id: &str) -> bool {
    matches!(cache.get(subject_id).await, Ok(Some(entry)) if entry.confirmed)
}

/// Cache whose first `failures` writes fail.
struct FlakyCache {
    inner: MemoryConfirmationCache,
    failures: AtomicUsize,
}

#[async_trait]
impl ConfirmationCache for FlakyCache {
    async fn set(&self, subject_id: &str, confirmed: bool, ttl: Duration) -> Result<(), CacheError> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(CacheError::Backend("connection refused".to_string()));
        }
        self.inner.set(subject_id, confirmed, ttl).await
    }

    async fn get(&self, subject_id: &str) -> Result<Option<CacheEntry>, CacheError> {
        self.inner.get(subject_id).await
    }
}

#[tokio::test]
async fn test_published_events_are_cached_and_acked() {
    let channel = MemoryChannel::new();
    let cache = MemoryConfirmationCache::new();
    let consumer = RunningConsumer::start(&channel, Arc::new(cache.clone()));

    for subject_id in ["U1", "U2", "U3"] {
        channel
            .publish(&AuthEvent::token_validated(subject_id))
            .await
            .unwrap();
    }

    assert!(wait_until(WAIT, || async { channel.acked_count() == 3 }).await);
    for subject_id in ["U1", "U2", "U3"] {
        assert!(is_confirmed(&cache, subject_id).await, "{subject_id}");
    }
    assert_eq!(channel.pending(), 0);

    consumer.stop().await;
}

#[tokio::test]
async fn test_redelivered_event_is_idempotent() {
    let channel = MemoryChannel::new();
    let cache = MemoryConfirmationCache::new();
    let consumer = RunningConsumer::start(&channel, Arc::new(cache.clone()));

    let event = AuthEvent::token_validated("U1");
    channel.publish(&event).await.unwrap();
    channel.publish(&event).await.unwrap();

    assert!(wait_until(WAIT, || async { channel.acked_count() == 2 }).await);
    assert_eq!(cache.len(), 1);
    assert!(is_confirmed(&cache, "U1").await);

    consumer.stop().await;
}

#[tokio::test]
async fn test_poison_message_is_dead_lettered_and_consumption_continues() {
    let channel = MemoryChannel::new();
    let cache = MemoryConfirmationCache::new();
    let consumer = RunningConsumer::start(&channel, Arc::new(cache.clone()));

    channel.publish_raw("not json");
    channel.publish_raw(r#"{"version":9,"subject_id":"U1","event":"token_validated"}"#);
    channel
        .publish(&AuthEvent::token_validated("U2"))
        .await
        .unwrap();

    assert!(wait_until(WAIT, || async { channel.acked_count() == 1 }).await);
    assert_eq!(channel.dead_lettered_count(), 2);
    assert!(!is_confirmed(&cache, "U1").await);
    assert!(is_confirmed(&cache, "U2").await);

    consumer.stop().await;
}

#[tokio::test]
async fn test_consumer_reconnects_after_connection_loss() {
    let channel = MemoryChannel::new();
    let cache = MemoryConfirmationCache::new();
    let consumer = RunningConsumer::start(&channel, Arc::new(cache.clone()));

    channel
        .publish(&AuthEvent::token_validated("U1"))
        .await
        .unwrap();
    assert!(wait_until(WAIT, || async { channel.acked_count() == 1 }).await);

    channel.disconnect();
    channel
        .publish(&AuthEvent::token_validated("U2"))
        .await
        .unwrap();

    // Picked up by the next session after the first backoff
    assert!(wait_until(WAIT, || async { is_confirmed(&cache, "U2").await }).await);

    consumer.stop().await;
}

#[tokio::test]
async fn test_consumer_waits_out_broker_outage() {
    let channel = MemoryChannel::new();
    channel.set_unavailable(true);
    let cache = MemoryConfirmationCache::new();
    let consumer = RunningConsumer::start(&channel, Arc::new(cache.clone()));

    tokio::time::sleep(Duration::from_millis(100)).await;
    channel.set_unavailable(false);
    channel
        .publish(&AuthEvent::token_validated("U1"))
        .await
        .unwrap();

    assert!(wait_until(WAIT, || async { is_confirmed(&cache, "U1").await }).await);

    consumer.stop().await;
}

#[tokio::test]
async fn test_cache_outage_requeues_until_write_succeeds() {
    let channel = MemoryChannel::new();
    let cache = Arc::new(FlakyCache {
        inner: MemoryConfirmationCache::new(),
        failures: AtomicUsize::new(1),
    });
    let consumer = RunningConsumer::start(&channel, cache.clone());

    channel
        .publish(&AuthEvent::token_validated("U1"))
        .await
        .unwrap();

    assert!(wait_until(WAIT, || async { channel.acked_count() == 1 }).await);
    assert!(is_confirmed(&cache.inner, "U1").await);
    assert_eq!(channel.dead_lettered_count(), 0);

    consumer.stop().await;
}

#[tokio::test]
async fn test_events_published_while_stopped_are_consumed_later() {
    let channel = MemoryChannel::new();
    let cache = MemoryConfirmationCache::new();

    channel
        .publish(&AuthEvent::token_validated("U1"))
        .await
        .unwrap();
    assert_eq!(channel.pending(), 1);

    let consumer = RunningConsumer::start(&channel, Arc::new(cache.clone()));

    assert!(wait_until(WAIT, || async { is_confirmed(&cache, "U1").await }).await);

    consumer.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_confirmation_expires_after_ttl() {
    let channel = MemoryChannel::new();
    let cache = MemoryConfirmationCache::new();
    let consumer = RunningConsumer::start(&channel, Arc::new(cache.clone()));

    channel
        .publish(&AuthEvent::token_validated("U1"))
        .await
        .unwrap();
    assert!(wait_until(WAIT, || async { is_confirmed(&cache, "U1").await }).await);

    tokio::time::advance(TTL + Duration::from_secs(1)).await;
    assert!(cache.get("U1").await.unwrap().is_none());

    consumer.stop().await;
}
