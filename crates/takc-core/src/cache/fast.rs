//! Fast, volatile key-value tier

use crate::error::{Result, TakcError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// Volatile key-value store with per-key expiry
#[async_trait]
pub trait FastTier: Send + Sync {
    /// Store `value` under `key` for `ttl`
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()>;

    /// Get a live value; expired keys read as absent
    async fn get(&self, key: &str) -> Result<Option<String>>;
}

/// Cache entry with TTL
#[derive(Clone)]
struct Slot {
    value: String,
    /// `None` when `now + ttl` does not fit in an `Instant`
    expires_at: Option<Instant>,
}

impl Slot {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

/// In-process fast tier; expired slots are dropped on the next write
#[derive(Default)]
pub struct MemoryFastTier {
    entries: RwLock<HashMap<String, Slot>>,
}

impl MemoryFastTier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all entries
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }

    /// Number of slots held, live or not yet pruned
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl FastTier for MemoryFastTier {
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        let now = Instant::now();
        let slot = Slot {
            value,
            expires_at: now.checked_add(ttl),
        };

        let mut entries = self
            .entries
            .write()
            .map_err(|_| TakcError::CacheUnavailable("fast tier lock poisoned".to_string()))?;
        entries.retain(|_, slot| slot.is_live(now));
        entries.insert(key.to_string(), slot);

        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| TakcError::CacheUnavailable("fast tier lock poisoned".to_string()))?;

        Ok(entries
            .get(key)
            .filter(|slot| slot.is_live(Instant::now()))
            .map(|slot| slot.value.clone()))
    }
}
