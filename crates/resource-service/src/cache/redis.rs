//! Redis-backed confirmation cache.
//!
//! # Key pattern
//!
//! - `user_auth:{subject_id}` - JSON `{"confirmed":true}`, expiry set with `PX`
//!
//! The multiplexed connection is cheap to clone and safe to use
//! concurrently, so each operation clones it instead of locking.

use super::{cache_key, ttl_millis, CacheEntry, CacheError, ConfirmationCache, StoredValue};
use async_trait::async_trait;
use common::secret::{ExposeSecret, SecretString};
use redis::aio::MultiplexedConnection;
use redis::Client;
use std::time::Duration;
use tracing::instrument;

/// Confirmation cache stored in Redis.
#[derive(Clone)]
pub struct RedisConfirmationCache {
    connection: MultiplexedConnection,
}

impl RedisConfirmationCache {
    /// Connect to Redis.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Backend` if the URL is invalid or the connection
    /// cannot be established.
    pub async fn connect(redis_url: &SecretString) -> Result<Self, CacheError> {
        // The URL may carry a password, never log it
        let client = Client::open(redis_url.expose_secret()).map_err(|e| {
            tracing::error!(target: "resource.cache.redis", error = %e, "Failed to open Redis client");
            CacheError::Backend(format!("Failed to open Redis client: {e}"))
        })?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| {
                tracing::error!(target: "resource.cache.redis", error = %e, "Failed to connect to Redis");
                CacheError::Backend(format!("Failed to connect to Redis: {e}"))
            })?;

        tracing::info!(target: "resource.cache.redis", "Connected to Redis");

        Ok(Self { connection })
    }
}

#[async_trait]
impl ConfirmationCache for RedisConfirmationCache {
    #[instrument(skip_all, name = "resource.cache.set")]
    async fn set(
        &self,
        subject_id: &str,
        confirmed: bool,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let ttl_ms = ttl_millis(ttl)?;
        let value = serde_json::to_string(&StoredValue { confirmed })
            .map_err(|e| CacheError::CorruptValue(e.to_string()))?;

        let mut conn = self.connection.clone();
        let () = redis::cmd("SET")
            .arg(cache_key(subject_id))
            .arg(value)
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut conn)
            .await
            .map_err(|e| {
                tracing::warn!(target: "resource.cache.redis", error = %e, "Failed to write cache entry");
                CacheError::Backend(format!("SET failed: {e}"))
            })?;

        Ok(())
    }

    #[instrument(skip_all, name = "resource.cache.get")]
    async fn get(&self, subject_id: &str) -> Result<Option<CacheEntry>, CacheError> {
        let key = cache_key(subject_id);
        let mut conn = self.connection.clone();

        let (value, pttl): (Option<String>, i64) = redis::pipe()
            .atomic()
            .cmd("GET")
            .arg(&key)
            .cmd("PTTL")
            .arg(&key)
            .query_async(&mut conn)
            .await
            .map_err(|e| {
                tracing::warn!(target: "resource.cache.redis", error = %e, "Failed to read cache entry");
                CacheError::Backend(format!("GET failed: {e}"))
            })?;

        let Some(value) = value else {
            return Ok(None);
        };

        // -2 means the key expired between GET and PTTL, -1 means no expiry
        let expires_in = match u64::try_from(pttl) {
            Ok(ms) => Duration::from_millis(ms),
            Err(_) if pttl == -2 => return Ok(None),
            Err(_) => Duration::ZERO,
        };

        Ok(Some(decode_entry(subject_id, &value, expires_in)?))
    }
}

fn decode_entry(
    subject_id: &str,
    value: &str,
    expires_in: Duration,
) -> Result<CacheEntry, CacheError> {
    let stored: StoredValue =
        serde_json::from_str(value).map_err(|e| CacheError::CorruptValue(e.to_string()))?;

    Ok(CacheEntry {
        subject_id: subject_id.to_string(),
        confirmed: stored.confirmed,
        expires_in,
    })
}
