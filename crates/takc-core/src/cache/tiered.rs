//! Two-tier cache: fast volatile tier in front of a durable object store

use super::{durable_key, fast_key, legacy_durable_key, parse_durable_key, FastTier, ObjectStore};
use crate::compress::{CacheEntry, CompressionRate, EntryMetadata, EntrySource};
use crate::error::{Result, TakcError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_TTL: Duration = Duration::from_secs(86_400);
const DEFAULT_OP_TIMEOUT: Duration = Duration::from_millis(2_000);

/// Where a `get` found its entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheTier {
    Fast,
    Durable,
    Legacy,
}

/// Entry returned by [`TieredCache::lookup`] with the tier that served it
#[derive(Debug, Clone)]
pub struct CacheHit {
    pub entry: CacheEntry,
    pub tier: CacheTier,
}

/// Write-through cache keyed by (task_type, rate)
pub struct TieredCache {
    fast: Arc<dyn FastTier>,
    durable: Arc<dyn ObjectStore>,
    ttl: Duration,
    op_timeout: Duration,
    read_attempts: u32,
}

impl TieredCache {
    pub fn new(fast: Arc<dyn FastTier>, durable: Arc<dyn ObjectStore>) -> Self {
        Self {
            fast,
            durable,
            ttl: DEFAULT_TTL,
            op_timeout: DEFAULT_OP_TIMEOUT,
            read_attempts: 2,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_op_timeout(mut self, timeout: Duration) -> Self {
        self.op_timeout = timeout;
        self
    }

    pub fn with_read_attempts(mut self, attempts: u32) -> Self {
        self.read_attempts = attempts.max(1);
        self
    }

    /// Persist an entry in both tiers
    ///
    /// The durable write is authoritative and runs first; its failure is
    /// returned as `DurableWriteFailure`. A fast-tier failure is logged only.
    pub async fn put(&self, entry: &CacheEntry) -> Result<()> {
        super::validate_task_type(&entry.task_type)?;
        let body = serde_json::to_string(entry)?;
        let key = durable_key(&entry.task_type, entry.rate);

        let written = tokio::time::timeout(
            self.op_timeout,
            self.durable.put(&key, body.clone().into_bytes()),
        )
        .await;
        match written {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                return Err(TakcError::DurableWriteFailure {
                    key,
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                return Err(TakcError::DurableWriteFailure {
                    key,
                    reason: format!("timed out after {:?}", self.op_timeout),
                })
            }
        }

        self.set_fast(&entry.task_type, entry.rate, body).await;
        tracing::debug!(task_type = %entry.task_type, rate = %entry.rate, "Cached entry");
        Ok(())
    }

    /// Fetch an entry, consulting the fast tier first
    pub async fn get(&self, task_type: &str, rate: CompressionRate) -> Result<CacheEntry> {
        self.lookup(task_type, rate).await.map(|hit| hit.entry)
    }

    /// Like [`get`](Self::get) but reports which tier answered
    pub async fn lookup(&self, task_type: &str, rate: CompressionRate) -> Result<CacheHit> {
        super::validate_task_type(task_type)?;

        if let Some(entry) = self.get_fast(task_type, rate).await {
            tracing::debug!(task_type, rate = %rate, "Fast tier hit");
            return Ok(CacheHit {
                entry,
                tier: CacheTier::Fast,
            });
        }

        let (body, tier) = match self.read_durable(&durable_key(task_type, rate)).await? {
            Some(body) => (body, CacheTier::Durable),
            None => match self.read_durable(&legacy_durable_key(task_type, rate)).await? {
                Some(body) => (body, CacheTier::Legacy),
                None => return Err(TakcError::cache_miss(task_type, rate)),
            },
        };

        let entry = decode_entry(&body, task_type, rate)?;

        // Repair the fast tier before returning
        match serde_json::to_string(&entry) {
            Ok(json) => self.set_fast(task_type, rate, json).await,
            Err(e) => tracing::warn!("Could not serialize entry for fast tier: {}", e),
        }

        Ok(CacheHit { entry, tier })
    }

    /// List cached (task_type, rate) pairs, optionally for one task type
    pub async fn list(&self, task_type: Option<&str>) -> Result<Vec<(String, CompressionRate)>> {
        let prefix = match task_type {
            Some(task) => {
                super::validate_task_type(task)?;
                format!("{}/{}/", super::DURABLE_PREFIX, task)
            }
            None => format!("{}/", super::DURABLE_PREFIX),
        };

        let keys = tokio::time::timeout(self.op_timeout, self.durable.list(&prefix))
            .await
            .map_err(|_| TakcError::CacheUnavailable("listing timed out".to_string()))??;

        Ok(keys.iter().filter_map(|k| parse_durable_key(k)).collect())
    }

    async fn get_fast(&self, task_type: &str, rate: CompressionRate) -> Option<CacheEntry> {
        let key = fast_key(task_type, rate);
        let raw = match tokio::time::timeout(self.op_timeout, self.fast.get(&key)).await {
            Ok(Ok(raw)) => raw?,
            Ok(Err(e)) => {
                tracing::warn!("Fast tier read failed for {}: {}", key, e);
                return None;
            }
            Err(_) => {
                tracing::warn!("Fast tier read timed out for {}", key);
                return None;
            }
        };

        match serde_json::from_str::<CacheEntry>(&raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!("Discarding unreadable fast tier value for {}: {}", key, e);
                None
            }
        }
    }

    async fn set_fast(&self, task_type: &str, rate: CompressionRate, value: String) {
        let key = fast_key(task_type, rate);
        match tokio::time::timeout(self.op_timeout, self.fast.set(&key, value, self.ttl)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!("Fast tier write failed for {}: {}", key, e),
            Err(_) => tracing::warn!("Fast tier write timed out for {}", key),
        }
    }

    async fn read_durable(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut last_error = String::new();

        for attempt in 1..=self.read_attempts {
            match tokio::time::timeout(self.op_timeout, self.durable.get(key)).await {
                Ok(Ok(body)) => return Ok(body),
                Ok(Err(e)) => last_error = e.to_string(),
                Err(_) => last_error = format!("timed out after {:?}", self.op_timeout),
            }
            tracing::warn!(
                "Durable read of {} failed (attempt {}/{}): {}",
                key,
                attempt,
                self.read_attempts,
                last_error
            );
        }

        Err(TakcError::CacheUnavailable(format!("{}: {}", key, last_error)))
    }
}

/// Layout written before entries carried their own key fields
#[derive(Deserialize)]
struct LegacyEntry {
    compressed_kv: String,
    #[serde(default)]
    metadata: LegacyMetadata,
}

#[derive(Deserialize, Default)]
struct LegacyMetadata {
    #[serde(default)]
    original_tokens: usize,
    compressed_tokens: Option<usize>,
    model_used: Option<String>,
    timestamp: Option<serde_json::Value>,
    task_description: Option<String>,
    chunks_processed: Option<usize>,
}

fn decode_entry(body: &[u8], task_type: &str, rate: CompressionRate) -> Result<CacheEntry> {
    if let Ok(entry) = serde_json::from_slice::<CacheEntry>(body) {
        if entry.task_type != task_type || entry.rate != rate {
            tracing::warn!(
                "Entry stored under {}/{} claims {}/{}",
                task_type,
                rate,
                entry.task_type,
                entry.rate
            );
        }
        return Ok(entry);
    }

    let legacy: LegacyEntry = serde_json::from_slice(body)?;
    let meta = legacy.metadata;
    let compressed_tokens = meta
        .compressed_tokens
        .unwrap_or_else(|| crate::index::count_tokens(&legacy.compressed_kv));
    let created_at = meta
        .timestamp
        .as_ref()
        .and_then(|ts| ts.as_i64())
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .unwrap_or_default();

    Ok(CacheEntry {
        task_type: task_type.to_string(),
        rate,
        compressed_text: legacy.compressed_kv,
        metadata: EntryMetadata {
            original_tokens: meta.original_tokens,
            compressed_tokens,
            achieved_ratio: crate::compress::achieved_ratio(meta.original_tokens, compressed_tokens),
            target_ratio: rate.target_ratio(),
            model_id: meta.model_used.unwrap_or_else(|| "unknown".to_string()),
            created_at,
            source: EntrySource::Primary,
            task_description: meta.task_description.unwrap_or_default(),
            chunks_processed: meta.chunks_processed.unwrap_or_default(),
            attempts: 0,
            strategy: Default::default(),
            context_hash: String::new(),
            schema_version: 1,
        },
    })
}
