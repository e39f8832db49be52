//! Tiered storage for compressed entries
//!
//! Key layout:
//! - fast tier: `takc:{task_type}:{rate}`
//! - durable tier: `cache/v2/{task_type}/{rate}/cache.json`
//! - legacy durable layout (read only): `cache/{task_type}/{rate}/cache.json`

mod durable;
mod fast;
mod tiered;

pub use durable::{FsObjectStore, ObjectStore, SqliteObjectStore};
pub use fast::{FastTier, MemoryFastTier};
pub use tiered::{CacheHit, CacheTier, TieredCache};

use crate::compress::CompressionRate;
use crate::error::{Result, TakcError};

const FAST_PREFIX: &str = "takc";
const DURABLE_PREFIX: &str = "cache/v2";
const LEGACY_PREFIX: &str = "cache";
const OBJECT_NAME: &str = "cache.json";

pub fn fast_key(task_type: &str, rate: CompressionRate) -> String {
    format!("{}:{}:{}", FAST_PREFIX, task_type, rate)
}

pub fn durable_key(task_type: &str, rate: CompressionRate) -> String {
    format!("{}/{}/{}/{}", DURABLE_PREFIX, task_type, rate, OBJECT_NAME)
}

pub fn legacy_durable_key(task_type: &str, rate: CompressionRate) -> String {
    format!("{}/{}/{}/{}", LEGACY_PREFIX, task_type, rate, OBJECT_NAME)
}

/// Inverse of [`durable_key`]
pub fn parse_durable_key(key: &str) -> Option<(String, CompressionRate)> {
    let rest = key.strip_prefix(DURABLE_PREFIX)?.strip_prefix('/')?;
    let mut parts = rest.split('/');
    let task = parts.next()?;
    let rate = parts.next()?.parse().ok()?;
    if parts.next()? != OBJECT_NAME || parts.next().is_some() || task.is_empty() {
        return None;
    }
    Some((task.to_string(), rate))
}

/// Task types become key segments, so keep them to a safe alphabet
pub fn validate_task_type(task_type: &str) -> Result<()> {
    let ok = !task_type.is_empty()
        && !task_type.starts_with('.')
        && task_type
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if ok {
        Ok(())
    } else {
        Err(TakcError::InvalidInput(format!(
            "Invalid task type '{}': use letters, digits, '_', '-' or '.'",
            task_type
        )))
    }
}
