//! LLM integration
//!
//! Provides the inference client trait, an OpenAI-compatible HTTP
//! implementation, and the retry policy used around every call.

mod client;
mod retry;

pub use client::{
    classify_status, classify_transport, APIMetrics, ChatMessage, CompletionRequest, LLMClient,
    MetricsSnapshot, VLLMClient,
};
pub use retry::{complete_with_retry, RetryOutcome, RetryPolicy};
