//! HTTP client for external LLM services (vLLM, OpenAI, etc.)

use crate::config::LLMServiceConfig;
use crate::error::{Result, TakcError};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

/// Trait for LLM service clients
///
/// Implementations classify failures into `RateLimited`,
/// `TransientInference` and `FatalInference` so callers can decide whether
/// to retry.
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Generate a completion bounded by `request.max_tokens`
    async fn complete(&self, request: CompletionRequest) -> Result<String>;

    /// Get model name
    fn model_name(&self) -> &str;
}

/// Chat message for completion requests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// One inference call
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: usize,
    pub temperature: f32,
}

impl CompletionRequest {
    pub fn new(messages: Vec<ChatMessage>, max_tokens: usize, temperature: f32) -> Self {
        Self {
            messages,
            max_tokens,
            temperature,
        }
    }

    /// Concatenated message contents, mostly useful for assertions and logs
    pub fn prompt_text(&self) -> String {
        self.messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// API metrics for monitoring
#[derive(Debug, Default)]
pub struct APIMetrics {
    pub total_requests: AtomicU64,
    pub total_errors: AtomicU64,
    pub rate_limited: AtomicU64,
    pub total_latency_ms: AtomicU64,
}

/// Snapshot of API metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub total_errors: u64,
    pub rate_limited: u64,
    pub avg_latency_ms: f64,
}

/// vLLM/OpenAI-compatible client
pub struct VLLMClient {
    http_client: reqwest::Client,
    config: LLMServiceConfig,
    metrics: Arc<APIMetrics>,
}

impl VLLMClient {
    /// Create new vLLM client from configuration
    pub fn new(config: LLMServiceConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(TakcError::Http)?;

        Ok(Self {
            http_client,
            config,
            metrics: Arc::new(APIMetrics::default()),
        })
    }

    /// Same endpoint, different model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    /// Get current API metrics
    pub fn metrics(&self) -> MetricsSnapshot {
        let total = self.metrics.total_requests.load(Ordering::Relaxed);

        MetricsSnapshot {
            total_requests: total,
            total_errors: self.metrics.total_errors.load(Ordering::Relaxed),
            rate_limited: self.metrics.rate_limited.load(Ordering::Relaxed),
            avg_latency_ms: if total > 0 {
                self.metrics.total_latency_ms.load(Ordering::Relaxed) as f64 / total as f64
            } else {
                0.0
            },
        }
    }

    /// Send a tiny prompt to check the model is reachable and permitted
    pub async fn ping(&self) -> Result<()> {
        let request = CompletionRequest::new(
            vec![ChatMessage::user(
                "Hello, this is a test. Please respond with 'Test successful'.",
            )],
            10,
            0.0,
        );
        self.complete(request).await.map(|_| ())
    }

    fn record_error(&self) {
        self.metrics.total_errors.fetch_add(1, Ordering::Relaxed);
    }
}

/// Map an HTTP status to the inference error taxonomy
pub fn classify_status(status: StatusCode, body: &str) -> TakcError {
    let message = format!("LLM service error (HTTP {}): {}", status, body);
    if status == StatusCode::TOO_MANY_REQUESTS {
        TakcError::RateLimited(message)
    } else if status == StatusCode::REQUEST_TIMEOUT || status.is_server_error() {
        TakcError::TransientInference(message)
    } else {
        TakcError::FatalInference(message)
    }
}

/// Map a transport-level failure to the inference error taxonomy
pub fn classify_transport(err: &reqwest::Error) -> TakcError {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        TakcError::TransientInference(err.to_string())
    } else {
        TakcError::FatalInference(err.to_string())
    }
}

#[async_trait]
impl LLMClient for VLLMClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let start = Instant::now();
        self.metrics.total_requests.fetch_add(1, Ordering::Relaxed);

        #[derive(Serialize)]
        struct ChatRequest {
            model: String,
            messages: Vec<ChatMessage>,
            temperature: f32,
            max_tokens: usize,
        }

        #[derive(Deserialize)]
        struct ChatResponse {
            choices: Vec<ChatChoice>,
        }

        #[derive(Deserialize)]
        struct ChatChoice {
            message: ChatMessage,
        }

        let body = ChatRequest {
            model: self.config.model.clone(),
            messages: request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let url = format!("{}/v1/chat/completions", self.config.url.trim_end_matches('/'));

        let mut req = self.http_client.post(&url).json(&body);

        if let Some(ref api_key) = self.config.api_key {
            req = req.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = req.send().await.map_err(|e| {
            self.record_error();
            classify_transport(&e)
        })?;

        let status = response.status();
        if !status.is_success() {
            self.record_error();
            if status == StatusCode::TOO_MANY_REQUESTS {
                self.metrics.rate_limited.fetch_add(1, Ordering::Relaxed);
            }
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let chat_response: ChatResponse = response.json().await.map_err(|e| {
            self.record_error();
            if e.is_timeout() {
                TakcError::TransientInference(e.to_string())
            } else {
                TakcError::FatalInference(format!("Malformed LLM response: {}", e))
            }
        })?;

        let content = chat_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| {
                self.record_error();
                TakcError::FatalInference("No response from LLM".to_string())
            })?
            .message
            .content;

        let elapsed = start.elapsed().as_millis() as u64;
        self.metrics
            .total_latency_ms
            .fetch_add(elapsed, Ordering::Relaxed);

        tracing::debug!("LLM completion took {}ms", elapsed);

        Ok(content.trim().to_string())
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}
