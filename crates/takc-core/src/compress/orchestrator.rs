//! Drives the inference service to produce one cache entry per rate

use super::{
    achieved_ratio, compression_messages, fallback_compress, CacheEntry, CompressionRate,
    CompressionStrategy, EntryMetadata, EntrySource, ENTRY_SCHEMA_VERSION,
};
use crate::cache::TieredCache;
use crate::config::CompressionConfig;
use crate::error::{Result, TakcError};
use crate::index::{count_tokens, Chunk};
use crate::llm::{complete_with_retry, CompletionRequest, LLMClient, RetryPolicy};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Headroom added to the token budget for the completion limit
const OUTPUT_HEADROOM: usize = 100;

/// Outcome of compressing one task domain at several rates
#[derive(Debug, Clone, Serialize)]
pub struct CompressionRun {
    pub task_type: String,
    pub original_tokens: usize,
    pub entries: BTreeMap<CompressionRate, CacheEntry>,
    pub failures: BTreeMap<CompressionRate, String>,
}

impl CompressionRun {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Rates whose entry came from the local heuristic
    pub fn fallback_rates(&self) -> Vec<CompressionRate> {
        self.entries
            .values()
            .filter(|e| e.metadata.source == EntrySource::Fallback)
            .map(|e| e.rate)
            .collect()
    }
}

/// Everything shared by the per-rate tasks of one run
struct RunContext<'a> {
    task_type: &'a str,
    task_description: &'a str,
    few_shot_examples: Option<&'a str>,
    chunks: &'a [Chunk],
    working_context: String,
    original_tokens: usize,
    context_hash: String,
}

/// Compression orchestrator
pub struct Compressor {
    client: Arc<dyn LLMClient>,
    cache: Arc<TieredCache>,
    config: CompressionConfig,
    policy: RetryPolicy,
}

impl Compressor {
    pub fn new(client: Arc<dyn LLMClient>, cache: Arc<TieredCache>, config: CompressionConfig) -> Self {
        let policy = RetryPolicy::new(config.max_attempts, config.base_delay());
        Self {
            client,
            cache,
            config,
            policy,
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn config(&self) -> &CompressionConfig {
        &self.config
    }

    /// Compress `chunks` at every requested rate and cache each result
    pub async fn compress(
        &self,
        task_type: &str,
        chunks: &[Chunk],
        task_description: &str,
        rates: &[CompressionRate],
    ) -> Result<CompressionRun> {
        self.compress_with_examples(task_type, chunks, task_description, None, rates)
            .await
    }

    /// Like [`compress`](Self::compress) with few-shot examples in the prompt
    pub async fn compress_with_examples(
        &self,
        task_type: &str,
        chunks: &[Chunk],
        task_description: &str,
        few_shot_examples: Option<&str>,
        rates: &[CompressionRate],
    ) -> Result<CompressionRun> {
        crate::cache::validate_task_type(task_type)?;
        if rates.is_empty() {
            return Err(TakcError::InvalidInput("No compression rates requested".to_string()));
        }

        let working_context = working_context(chunks);
        let original_tokens = count_tokens(&working_context);
        if original_tokens == 0 {
            return Err(TakcError::InvalidInput(format!(
                "Nothing to compress for task type '{}'",
                task_type
            )));
        }

        let ctx = RunContext {
            task_type,
            task_description,
            few_shot_examples,
            chunks,
            context_hash: crate::db::hash_content(working_context.as_bytes()),
            working_context,
            original_tokens,
        };

        let rates: BTreeSet<CompressionRate> = rates.iter().copied().collect();
        tracing::info!(
            "Compressing {} ({} tokens, {} chunks) at {} rate(s)",
            task_type,
            original_tokens,
            chunks.len(),
            rates.len()
        );

        let results: Vec<_> = stream::iter(rates)
            .map(|rate| {
                let ctx = &ctx;
                async move { (rate, self.compress_rate(ctx, rate).await) }
            })
            .buffer_unordered(self.config.max_concurrency.max(1))
            .collect()
            .await;

        let mut run = CompressionRun {
            task_type: task_type.to_string(),
            original_tokens,
            entries: BTreeMap::new(),
            failures: BTreeMap::new(),
        };

        for (rate, result) in results {
            match result {
                Ok(entry) => {
                    run.entries.insert(rate, entry);
                }
                Err(e) => {
                    tracing::error!("Compression of {} at {} failed: {}", task_type, rate, e);
                    run.failures.insert(rate, e.to_string());
                }
            }
        }

        Ok(run)
    }

    async fn compress_rate(&self, ctx: &RunContext<'_>, rate: CompressionRate) -> Result<CacheEntry> {
        let target_tokens = rate.target_tokens(ctx.original_tokens);

        let produced = match self.config.strategy {
            CompressionStrategy::SinglePass => {
                self.call(ctx, &ctx.working_context, target_tokens).await
            }
            CompressionStrategy::Iterative => self.fold_chunks(ctx, rate).await,
        };

        let (compressed_text, source, attempts) = match produced {
            Ok((text, attempts)) => (text, EntrySource::Primary, attempts),
            Err((e, attempts)) if e.is_retryable() => {
                tracing::warn!(
                    "Inference unavailable for {} at {} after {} attempt(s) ({}), using local fallback",
                    ctx.task_type,
                    rate,
                    attempts,
                    e
                );
                let text = fallback_compress(&ctx.working_context, ctx.task_description, target_tokens);
                (text, EntrySource::Fallback, attempts)
            }
            Err((e, _)) => return Err(e),
        };

        let compressed_tokens = count_tokens(&compressed_text);
        let entry = CacheEntry {
            task_type: ctx.task_type.to_string(),
            rate,
            compressed_text,
            metadata: EntryMetadata {
                original_tokens: ctx.original_tokens,
                compressed_tokens,
                achieved_ratio: achieved_ratio(ctx.original_tokens, compressed_tokens),
                target_ratio: rate.target_ratio(),
                model_id: self.client.model_name().to_string(),
                created_at: Utc::now(),
                source,
                task_description: ctx.task_description.to_string(),
                chunks_processed: ctx.chunks.len(),
                attempts,
                strategy: self.config.strategy,
                context_hash: ctx.context_hash.clone(),
                schema_version: ENTRY_SCHEMA_VERSION,
            },
        };

        if !entry.within_budget() {
            tracing::warn!(
                "{} at {}: compressed output ({} tokens) is longer than its input ({} tokens)",
                ctx.task_type,
                rate,
                compressed_tokens,
                ctx.original_tokens
            );
        }

        self.cache.put(&entry).await?;

        tracing::info!(
            "{} at {}: {} -> {} tokens ({:.1}x, target {}x, {})",
            ctx.task_type,
            rate,
            ctx.original_tokens,
            compressed_tokens,
            entry.metadata.achieved_ratio,
            entry.metadata.target_ratio,
            source
        );

        Ok(entry)
    }

    /// One retried inference call; the error carries the attempts spent
    async fn call(
        &self,
        ctx: &RunContext<'_>,
        context: &str,
        target_tokens: usize,
    ) -> std::result::Result<(String, u32), (TakcError, u32)> {
        let messages =
            compression_messages(ctx.task_description, ctx.few_shot_examples, context, target_tokens);
        let max_tokens = (target_tokens + OUTPUT_HEADROOM).min(self.config.max_output_tokens.max(1));
        let request = CompletionRequest::new(messages, max_tokens, self.config.temperature);

        let outcome = complete_with_retry(self.client.as_ref(), &request, &self.policy).await;
        tracing::debug!(
            "{}: inference finished after {} attempt(s)",
            ctx.task_type,
            outcome.attempts
        );
        match outcome.result {
            Ok(text) => Ok((text, outcome.attempts)),
            Err(e) => Err((e, outcome.attempts)),
        }
    }

    /// Fold chunk by chunk: compress(previous summary + next chunk)
    async fn fold_chunks(
        &self,
        ctx: &RunContext<'_>,
        rate: CompressionRate,
    ) -> std::result::Result<(String, u32), (TakcError, u32)> {
        let mut summary = String::new();
        let mut seen_tokens = 0;
        let mut attempts = 0;

        for chunk in ctx.chunks {
            let fresh = chunk.fresh_text();
            let fresh_tokens = count_tokens(fresh);
            if fresh_tokens == 0 {
                continue;
            }
            seen_tokens += fresh_tokens;

            let input = if summary.is_empty() {
                fresh.to_string()
            } else {
                format!("{}\n\n{}", summary, fresh)
            };

            match self.call(ctx, &input, rate.target_tokens(seen_tokens)).await {
                Ok((text, spent)) => {
                    summary = text;
                    attempts += spent;
                }
                Err((e, spent)) => return Err((e, attempts + spent)),
            }
        }

        Ok((summary, attempts))
    }
}

/// Chunks in order with their overlap removed, separated by blank lines
pub fn working_context(chunks: &[Chunk]) -> String {
    let mut ordered: Vec<&Chunk> = chunks.iter().collect();
    ordered.sort_by_key(|c| c.index);
    ordered
        .iter()
        .map(|c| c.fresh_text())
        .filter(|t| !t.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}
