//! Compressed artifacts and their provenance

use super::{CompressionRate, CompressionStrategy};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current on-disk layout version of cache entries
pub const ENTRY_SCHEMA_VERSION: u32 = 2;

/// Where the compressed text came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntrySource {
    /// Produced by the inference service
    Primary,
    /// Produced by the local heuristic after inference retries ran out
    Fallback,
}

impl std::fmt::Display for EntrySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntrySource::Primary => f.write_str("primary"),
            EntrySource::Fallback => f.write_str("fallback"),
        }
    }
}

/// Provenance of one compressed artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub original_tokens: usize,
    pub compressed_tokens: usize,
    pub achieved_ratio: f64,
    pub target_ratio: usize,
    pub model_id: String,
    pub created_at: DateTime<Utc>,
    pub source: EntrySource,
    #[serde(default)]
    pub task_description: String,
    #[serde(default)]
    pub chunks_processed: usize,
    /// Inference calls made while producing this entry
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub strategy: CompressionStrategy,
    /// SHA-256 of the working context
    #[serde(default)]
    pub context_hash: String,
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
}

fn default_schema_version() -> u32 {
    ENTRY_SCHEMA_VERSION
}

/// Stored output of one compression run for one (task_type, rate) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub task_type: String,
    pub rate: CompressionRate,
    pub compressed_text: String,
    pub metadata: EntryMetadata,
}

impl CacheEntry {
    /// Whether the entry honours `compressed_tokens <= original_tokens`
    pub fn within_budget(&self) -> bool {
        self.metadata.compressed_tokens <= self.metadata.original_tokens
    }
}

/// Achieved reduction factor; an empty result counts as one token
pub fn achieved_ratio(original_tokens: usize, compressed_tokens: usize) -> f64 {
    original_tokens as f64 / compressed_tokens.max(1) as f64
}
