//! In-process confirmation cache.

use super::{ttl_millis, CacheEntry, CacheError, ConfirmationCache};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Expired entries are swept on writes once the map grows past this.
const SWEEP_THRESHOLD: usize = 1024;

#[derive(Debug)]
struct Slots {
    entries: HashMap<String, Slot>,
    // Doubles with the live set so a full sweep runs at most once per doubling
    sweep_at: usize,
}

impl Default for Slots {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            sweep_at: SWEEP_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    confirmed: bool,
    expires_at: Instant,
}

/// Confirmation cache held in process memory. Clones share entries.
///
/// Expiry follows the Tokio clock, so paused-time tests can step past a TTL.
#[derive(Debug, Clone, Default)]
pub struct MemoryConfirmationCache {
    slots: Arc<Mutex<Slots>>,
}

impl MemoryConfirmationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.slots.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ConfirmationCache for MemoryConfirmationCache {
    async fn set(
        &self,
        subject_id: &str,
        confirmed: bool,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        ttl_millis(ttl)?;
        let now = Instant::now();

        let mut slots = self.slots.lock();
        if slots.entries.len() >= slots.sweep_at {
            slots.entries.retain(|_, slot| slot.expires_at > now);
            slots.sweep_at = SWEEP_THRESHOLD.max(slots.entries.len().saturating_mul(2));
        }
        slots.entries.insert(
            subject_id.to_string(),
            Slot {
                confirmed,
                expires_at: now + ttl,
            },
        );
        Ok(())
    }

    async fn get(&self, subject_id: &str) -> Result<Option<CacheEntry>, CacheError> {
        let now = Instant::now();
        let mut slots = self.slots.lock();

        match slots.entries.get(subject_id).copied() {
            Some(slot) if slot.expires_at > now => Ok(Some(CacheEntry {
                subject_id: subject_id.to_string(),
                confirmed: slot.confirmed,
                expires_in: slot.expires_at - now,
            })),
            Some(_) => {
                slots.entries.remove(subject_id);
                Ok(None)
            }
            None => Ok(None),
        }
    }
}
