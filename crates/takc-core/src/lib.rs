//! takc core library
//!
//! Task-aware knowledge compression: compress a document once per
//! task domain at several ratios, cache the results, and answer queries
//! from the rate that fits each query's complexity.
//!
//! # Features
//! - Whitespace-token chunking with overlapping windows
//! - Compression through an OpenAI-compatible inference service, with
//!   bounded retry and a deterministic local fallback
//! - Two-tier cache: in-process TTL tier over a SQLite or filesystem store
//! - Keyword complexity routing and answer synthesis

pub mod cache;
pub mod compress;
pub mod config;
pub mod db;
pub mod error;
pub mod index;
pub mod llm;
pub mod router;
pub mod service;

pub use cache::{
    FastTier, FsObjectStore, MemoryFastTier, ObjectStore, SqliteObjectStore, TieredCache,
};
pub use compress::{
    CacheEntry, CompressionRate, CompressionRun, CompressionStrategy, Compressor, EntryMetadata,
    EntrySource,
};
pub use config::{CacheConfig, CompressionConfig, Config, LLMServiceConfig, RoutingConfig};
pub use db::Database;
pub use error::{Error, Result, TakcError};
pub use index::{chunk_text, count_tokens, Chunk, Chunker};
pub use llm::{ChatMessage, CompletionRequest, LLMClient, RetryPolicy, VLLMClient};
pub use router::{
    Complexity, ComplexityClassifier, KeywordClassifier, Query, QueryAnswer, QueryRouter,
};
pub use service::{IngestOptions, KnowledgeService};

/// URI scheme for cached entries exposed as resources
pub const RESOURCE_URI_PREFIX: &str = "takc://";

/// Default cache directory name
pub const CACHE_DIR_NAME: &str = "takc";

/// Default config directory name
pub const CONFIG_DIR_NAME: &str = "takc";
