//! Answering queries from compressed context

use super::{select_rate, Complexity, ComplexityClassifier, KeywordClassifier};
use crate::cache::{CacheTier, TieredCache};
use crate::compress::{CompressionRate, EntrySource};
use crate::config::RoutingConfig;
use crate::error::{Result, TakcError};
use crate::llm::{complete_with_retry, ChatMessage, CompletionRequest, LLMClient, RetryPolicy};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const ANSWER_SYSTEM_PROMPT: &str = "You answer questions using only the provided context. \
     If the answer cannot be derived from the context, say that the context does not contain it.";

/// Incoming question for one task domain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    pub text: String,
    pub task_type: String,
    #[serde(default)]
    pub rate_override: Option<CompressionRate>,
}

impl Query {
    pub fn new(task_type: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            task_type: task_type.into(),
            rate_override: None,
        }
    }

    pub fn with_rate(mut self, rate: CompressionRate) -> Self {
        self.rate_override = Some(rate);
        self
    }
}

/// How an answer was produced
#[derive(Debug, Clone, Serialize)]
pub struct AnswerMetadata {
    pub task_type: String,
    pub rate_requested: CompressionRate,
    pub rate_used: CompressionRate,
    /// None when the caller forced the rate
    pub complexity: Option<Complexity>,
    pub original_tokens: usize,
    pub compressed_tokens: usize,
    pub achieved_ratio: f64,
    pub target_ratio: usize,
    pub created_at: DateTime<Utc>,
    pub source: EntrySource,
    /// Model that produced the compressed entry
    pub model_id: String,
    /// Model that synthesized the answer
    pub answer_model: String,
    pub served_from: CacheTier,
    pub attempts: u32,
}

/// Reply to a [`Query`]
#[derive(Debug, Clone, Serialize)]
pub struct QueryAnswer {
    pub response: String,
    pub rate_used: CompressionRate,
    pub metadata: AnswerMetadata,
}

/// Query router
pub struct QueryRouter {
    client: Arc<dyn LLMClient>,
    cache: Arc<TieredCache>,
    classifier: Arc<dyn ComplexityClassifier>,
    config: RoutingConfig,
    policy: RetryPolicy,
}

impl QueryRouter {
    pub fn new(
        client: Arc<dyn LLMClient>,
        cache: Arc<TieredCache>,
        config: RoutingConfig,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            client,
            cache,
            classifier: Arc::new(KeywordClassifier::new()),
            config,
            policy,
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn ComplexityClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Rate a query would be served at, and the complexity behind it
    pub fn route(&self, query: &Query) -> (CompressionRate, Option<Complexity>) {
        match query.rate_override {
            Some(rate) => (rate, None),
            None => {
                let complexity = self.classifier.classify(&query.text);
                (
                    select_rate(complexity, self.config.low_complexity_rate),
                    Some(complexity),
                )
            }
        }
    }

    /// Answer a query from the cached entry for its routed rate
    pub async fn answer(&self, query: &Query) -> Result<QueryAnswer> {
        if query.text.trim().is_empty() {
            return Err(TakcError::InvalidInput("Query text is empty".to_string()));
        }
        if query.task_type.trim().is_empty() {
            return Err(TakcError::InvalidInput("Task type is empty".to_string()));
        }

        let (rate_requested, complexity) = self.route(query);
        tracing::debug!(
            "Routing '{}' for {} to {} (complexity: {:?})",
            query.text,
            query.task_type,
            rate_requested,
            complexity
        );

        let hit = self.cache.lookup(&query.task_type, rate_requested).await?;
        let entry = hit.entry;
        if entry.rate != rate_requested {
            tracing::warn!(
                "Requested {} for {} but the stored entry is {}",
                rate_requested,
                query.task_type,
                entry.rate
            );
        }

        let request = CompletionRequest::new(
            answer_messages(&entry.compressed_text, &query.text),
            self.config.answer_max_tokens,
            self.config.temperature,
        );
        let outcome = complete_with_retry(self.client.as_ref(), &request, &self.policy).await;
        let response = outcome.result.map_err(|e| match e {
            TakcError::RateLimited(msg) => {
                TakcError::TransientInference(format!("rate limited: {}", msg))
            }
            other => other,
        })?;

        tracing::info!(
            "Answered {} query at {} ({} tier, {} attempt(s))",
            query.task_type,
            entry.rate,
            match hit.tier {
                CacheTier::Fast => "fast",
                CacheTier::Durable => "durable",
                CacheTier::Legacy => "legacy",
            },
            outcome.attempts
        );

        Ok(QueryAnswer {
            response,
            rate_used: entry.rate,
            metadata: AnswerMetadata {
                task_type: entry.task_type.clone(),
                rate_requested,
                rate_used: entry.rate,
                complexity,
                original_tokens: entry.metadata.original_tokens,
                compressed_tokens: entry.metadata.compressed_tokens,
                achieved_ratio: entry.metadata.achieved_ratio,
                target_ratio: entry.metadata.target_ratio,
                created_at: entry.metadata.created_at,
                source: entry.metadata.source,
                model_id: entry.metadata.model_id.clone(),
                answer_model: self.client.model_name().to_string(),
                served_from: hit.tier,
                attempts: outcome.attempts,
            },
        })
    }
}

fn answer_messages(context: &str, question: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(ANSWER_SYSTEM_PROMPT),
        ChatMessage::user(format!(
            "CONTEXT:\n{}\n\nQUESTION: {}\n\nAnswer using only the context above.",
            context, question
        )),
    ]
}
