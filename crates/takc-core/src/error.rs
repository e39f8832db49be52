//! Error types for takc

use thiserror::Error;

/// Result type alias using TakcError
pub type Result<T> = std::result::Result<T, TakcError>;

/// Error type alias for convenience
pub type Error = TakcError;

/// Exit codes for CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL_ERROR: i32 = 1;
    pub const NOT_FOUND: i32 = 2;
    pub const INVALID_INPUT: i32 = 3;
}

/// Main error type for takc
#[derive(Debug, Error)]
pub enum TakcError {
    #[error("Inference service rate limited: {0}")]
    RateLimited(String),

    #[error("Transient inference error: {0}")]
    TransientInference(String),

    #[error("Fatal inference error: {0}")]
    FatalInference(String),

    #[error(
        "No compressed cache for task_type '{task_type}' at rate '{rate}'; \
         run a compression for this pair first"
    )]
    CacheMiss { task_type: String, rate: String },

    #[error("Durable write failed for {key}: {reason}")]
    DurableWriteFailure { key: String, reason: String },

    #[error("Cache unavailable: {0}")]
    CacheUnavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl TakcError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::CacheMiss { .. } => exit_codes::NOT_FOUND,
            Self::InvalidInput(_) | Self::Config(_) => exit_codes::INVALID_INPUT,
            _ => exit_codes::GENERAL_ERROR,
        }
    }

    /// Whether the inference call that produced this error may be retried
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited(_) | Self::TransientInference(_))
    }

    pub fn cache_miss(task_type: &str, rate: impl std::fmt::Display) -> Self {
        Self::CacheMiss {
            task_type: task_type.to_string(),
            rate: rate.to_string(),
        }
    }
}
