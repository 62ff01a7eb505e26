//! Confirmation cache.
//!
//! Short-lived record that the identity service recently validated a
//! credential for a subject. Written only by the auth event consumer, read
//! only for telemetry. Request authentication never looks here.
//!
//! Two backends share the [`ConfirmationCache`] trait:
//! - [`RedisConfirmationCache`] when `REDIS_URL` is set, shared by every
//!   resource-service and consumer instance
//! - [`MemoryConfirmationCache`] otherwise, local to one process

pub mod memory;
pub mod redis;

pub use memory::MemoryConfirmationCache;
pub use self::redis::RedisConfirmationCache;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Prefix for cache keys.
pub const KEY_PREFIX: &str = "user_auth:";

/// Cache key for a subject.
pub fn cache_key(subject_id: &str) -> String {
    format!("{KEY_PREFIX}{subject_id}")
}

/// A live cache entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub subject_id: String,
    pub confirmed: bool,
    /// Time left before the entry expires.
    pub expires_in: Duration,
}

/// Stored value. The key carries the subject id.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub(crate) struct StoredValue {
    pub confirmed: bool,
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache backend error: {0}")]
    Backend(String),

    #[error("Corrupt cache value: {0}")]
    CorruptValue(String),

    #[error("Invalid TTL: must be between one millisecond and seven days")]
    InvalidTtl,
}

/// Key-value store with per-entry expiry.
///
/// Writes to the same key are last-write-wins. There is no delete; entries
/// disappear when their TTL runs out.
#[async_trait]
pub trait ConfirmationCache: Send + Sync {
    /// Create or refresh the entry for `subject_id`.
    async fn set(&self, subject_id: &str, confirmed: bool, ttl: Duration)
        -> Result<(), CacheError>;

    /// Read the live entry for `subject_id`, if any.
    async fn get(&self, subject_id: &str) -> Result<Option<CacheEntry>, CacheError>;
}

/// Longest accepted entry lifetime.
pub const MAX_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

fn ttl_millis(ttl: Duration) -> Result<u64, CacheError> {
    let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
    if millis == 0 || ttl > MAX_TTL {
        return Err(CacheError::InvalidTtl);
    }
    Ok(millis)
}
