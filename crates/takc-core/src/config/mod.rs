//! Configuration management

use crate::compress::{CompressionRate, CompressionStrategy};
use crate::error::{Result, TakcError};
use crate::llm::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// LLM service configuration
    #[serde(default)]
    pub llm_service: LLMServiceConfig,

    /// Compression run settings
    #[serde(default)]
    pub compression: CompressionConfig,

    /// Cache tier settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Query routing settings
    #[serde(default)]
    pub routing: RoutingConfig,

    /// Named model catalogue (short name -> model id)
    #[serde(default = "default_models")]
    pub models: BTreeMap<String, String>,
}

/// LLM service configuration for external inference
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMServiceConfig {
    /// Base URL of the OpenAI-compatible chat completions service
    pub url: String,

    /// Model used for compression and answer synthesis
    #[serde(default = "default_chat_model")]
    pub model: String,

    /// API key (optional, for authenticated services)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for LLMServiceConfig {
    fn default() -> Self {
        Self {
            url: std::env::var("TAKC_LLM_URL")
                .unwrap_or_else(|_| "http://localhost:8000".to_string()),
            model: default_chat_model(),
            api_key: std::env::var("TAKC_LLM_API_KEY").ok(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_chat_model() -> String {
    std::env::var("TAKC_LLM_MODEL")
        .unwrap_or_else(|_| "meta-llama/Llama-3.1-8B-Instruct".to_string())
}

fn default_timeout() -> u64 {
    60
}

fn default_models() -> BTreeMap<String, String> {
    [
        ("llama-3.1-8b", "meta-llama/Llama-3.1-8B-Instruct"),
        ("llama-3.1-70b", "meta-llama/Llama-3.1-70B-Instruct"),
        ("qwen-2.5-7b", "Qwen/Qwen2.5-7B-Instruct"),
        ("mistral-7b", "mistralai/Mistral-7B-Instruct-v0.3"),
    ]
    .into_iter()
    .map(|(name, id)| (name.to_string(), id.to_string()))
    .collect()
}

/// Compression orchestrator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionConfig {
    /// Total inference calls per rate before falling back (first call included)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base backoff delay; attempt n waits base * 2^n
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Rates compressed concurrently
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    #[serde(default = "default_compression_temperature")]
    pub temperature: f32,

    /// Hard cap on requested output tokens
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: usize,

    /// Chunk size in tokens for the aggressive rates (ultra, high)
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Chunk overlap in tokens for the aggressive rates (ultra, high)
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    #[serde(default)]
    pub strategy: CompressionStrategy,

    /// Collapse whitespace runs before chunking
    #[serde(default)]
    pub clean_whitespace: bool,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_concurrency: default_max_concurrency(),
            temperature: default_compression_temperature(),
            max_output_tokens: default_max_output_tokens(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            strategy: CompressionStrategy::default(),
            clean_whitespace: false,
        }
    }
}

impl CompressionConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    /// Chunk geometry for a rate. Medium and light keep more detail per call,
    /// so they get windows twice as wide.
    pub fn chunk_geometry(&self, rate: CompressionRate) -> (usize, usize) {
        match rate {
            CompressionRate::Ultra | CompressionRate::High => (self.chunk_size, self.chunk_overlap),
            CompressionRate::Medium | CompressionRate::Light => {
                (self.chunk_size * 2, self.chunk_overlap * 2)
            }
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    std::env::var("TAKC_RETRY_BASE_MS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(1000)
}

fn default_max_concurrency() -> usize {
    2
}

fn default_compression_temperature() -> f32 {
    0.1
}

fn default_max_output_tokens() -> usize {
    4096
}

fn default_chunk_size() -> usize {
    512
}

fn default_chunk_overlap() -> usize {
    64
}

/// Durable tier backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DurableBackend {
    /// Single SQLite file
    #[default]
    Sqlite,
    /// Directory tree of JSON objects
    Fs,
}

/// Tiered cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub backend: DurableBackend,

    /// Durable store location (SQLite file or directory)
    #[serde(default = "default_store_path")]
    pub path: PathBuf,

    /// Fast tier time-to-live in seconds
    #[serde(default = "default_fast_ttl")]
    pub fast_ttl_secs: u64,

    /// Upper bound on any single tier operation
    #[serde(default = "default_op_timeout_ms")]
    pub op_timeout_ms: u64,

    /// Durable read attempts while serving a query
    #[serde(default = "default_read_attempts")]
    pub read_attempts: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: DurableBackend::default(),
            path: default_store_path(),
            fast_ttl_secs: default_fast_ttl(),
            op_timeout_ms: default_op_timeout_ms(),
            read_attempts: default_read_attempts(),
        }
    }
}

impl CacheConfig {
    pub fn fast_ttl(&self) -> Duration {
        Duration::from_secs(self.fast_ttl_secs)
    }

    pub fn op_timeout(&self) -> Duration {
        Duration::from_millis(self.op_timeout_ms)
    }
}

fn default_store_path() -> PathBuf {
    if let Ok(path) = std::env::var("TAKC_STORE") {
        return PathBuf::from(path);
    }
    crate::db::Database::default_path()
}

/// Longest fast-tier TTL accepted (one year)
pub const MAX_FAST_TTL_SECS: u64 = 365 * 86_400;

fn default_fast_ttl() -> u64 {
    86_400
}

fn default_op_timeout_ms() -> u64 {
    2_000
}

fn default_read_attempts() -> u32 {
    2
}

/// Query routing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Rate served to low-complexity queries
    #[serde(default = "default_low_rate")]
    pub low_complexity_rate: CompressionRate,

    #[serde(default = "default_answer_max_tokens")]
    pub answer_max_tokens: usize,

    #[serde(default = "default_answer_temperature")]
    pub temperature: f32,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            low_complexity_rate: default_low_rate(),
            answer_max_tokens: default_answer_max_tokens(),
            temperature: default_answer_temperature(),
        }
    }
}

fn default_low_rate() -> CompressionRate {
    CompressionRate::High
}

fn default_answer_max_tokens() -> usize {
    1024
}

fn default_answer_temperature() -> f32 {
    0.2
}

impl Config {
    /// Load config from default path (or TAKC_CONFIG)
    pub fn load() -> Result<Self> {
        let path = std::env::var("TAKC_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| Self::default_path());
        Self::load_from(&path)
    }

    /// Load config from a specific path; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_yaml::from_str(&content)?
        } else {
            Config::default()
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Environment variables win over file values
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("TAKC_LLM_URL") {
            self.llm_service.url = url;
        }
        if let Ok(model) = std::env::var("TAKC_LLM_MODEL") {
            self.llm_service.model = model;
        }
        if let Ok(key) = std::env::var("TAKC_LLM_API_KEY") {
            self.llm_service.api_key = Some(key);
        }
        if let Ok(path) = std::env::var("TAKC_STORE") {
            self.cache.path = PathBuf::from(path);
        }
        if let Some(ms) = std::env::var("TAKC_RETRY_BASE_MS")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            self.compression.base_delay_ms = ms;
        }
    }

    /// Get default config path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(crate::CONFIG_DIR_NAME)
            .join("config.yml")
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        let c = &self.compression;
        if c.max_attempts == 0 {
            return Err(TakcError::Config(
                "compression.max_attempts must be at least 1".to_string(),
            ));
        }
        if c.max_concurrency == 0 {
            return Err(TakcError::Config(
                "compression.max_concurrency must be at least 1".to_string(),
            ));
        }
        if c.chunk_size == 0 || c.chunk_overlap >= c.chunk_size {
            return Err(TakcError::Config(format!(
                "compression.chunk_overlap ({}) must be smaller than chunk_size ({})",
                c.chunk_overlap, c.chunk_size
            )));
        }
        if self.cache.fast_ttl_secs == 0 || self.cache.fast_ttl_secs > MAX_FAST_TTL_SECS {
            return Err(TakcError::Config(format!(
                "cache.fast_ttl_secs must be between 1 and {} (got {})",
                MAX_FAST_TTL_SECS, self.cache.fast_ttl_secs
            )));
        }
        if self.cache.read_attempts == 0 {
            return Err(TakcError::Config(
                "cache.read_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Retry policy for inference calls; each call also gets a local deadline
    /// of `llm_service.timeout_secs`
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.compression.max_attempts, self.compression.base_delay())
            .with_call_timeout(Duration::from_secs(self.llm_service.timeout_secs))
    }

    /// Resolve a catalogue name to a model id; unknown names pass through
    pub fn resolve_model(&self, name: &str) -> String {
        self.models
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.compression.max_attempts, 3);
        assert_eq!(config.routing.low_complexity_rate, CompressionRate::High);
        assert_eq!(config.cache.fast_ttl_secs, 86_400);
    }

    #[test]
    fn test_fast_ttl_bounds() {
        let mut config = Config::default();
        config.cache.fast_ttl_secs = u64::MAX;
        assert!(matches!(config.validate(), Err(TakcError::Config(_))));

        config.cache.fast_ttl_secs = 0;
        assert!(matches!(config.validate(), Err(TakcError::Config(_))));

        config.cache.fast_ttl_secs = MAX_FAST_TTL_SECS;
        config.validate().unwrap();
    }

    #[test]
    fn test_chunk_geometry_doubles_for_light_rates() {
        let config = CompressionConfig::default();
        assert_eq!(config.chunk_geometry(CompressionRate::Ultra), (512, 64));
        assert_eq!(config.chunk_geometry(CompressionRate::High), (512, 64));
        assert_eq!(config.chunk_geometry(CompressionRate::Medium), (1024, 128));
        assert_eq!(config.chunk_geometry(CompressionRate::Light), (1024, 128));
    }

    #[test]
    fn test_load_partial_yaml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yml");
        std::fs::write(
            &path,
            "llm_service:\n  url: http://example:9000\nrouting:\n  low_complexity_rate: ultra\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.llm_service.url, "http://example:9000");
        assert_eq!(config.routing.low_complexity_rate, CompressionRate::Ultra);
        assert_eq!(config.compression.chunk_size, 512);
    }

    #[test]
    fn test_invalid_overlap_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yml");
        std::fs::write(
            &path,
            "llm_service:\n  url: http://x\ncompression:\n  chunk_size: 10\n  chunk_overlap: 10\n",
        )
        .unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, TakcError::Config(_)));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("absent.yml")).unwrap();
        assert_eq!(config.cache.backend, DurableBackend::Sqlite);
    }

    #[test]
    fn test_resolve_model() {
        let config = Config::default();
        assert_eq!(
            config.resolve_model("qwen-2.5-7b"),
            "Qwen/Qwen2.5-7B-Instruct"
        );
        assert_eq!(config.resolve_model("custom/model"), "custom/model");
    }

    #[test]
    fn test_retry_policy_follows_compression_settings() {
        let mut config = Config::default();
        config.compression.max_attempts = 5;
        assert_eq!(config.retry_policy().max_attempts(), 5);
    }
}
