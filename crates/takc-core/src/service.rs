//! Service facade shared by the CLI and the MCP server

use crate::cache::{FsObjectStore, MemoryFastTier, ObjectStore, SqliteObjectStore, TieredCache};
use crate::compress::{
    default_task_description, CacheEntry, CompressionRate, CompressionRun, CompressionStrategy,
    Compressor,
};
use crate::config::{Config, DurableBackend};
use crate::error::Result;
use crate::index::{chunk_text, clean_whitespace};
use crate::llm::{LLMClient, VLLMClient};
use crate::router::{Query, QueryAnswer, QueryRouter};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Per-ingest knobs
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    /// Defaults to a generic description of the task type
    pub task_description: Option<String>,
    pub few_shot_examples: Option<String>,
    /// Empty means every rate
    pub rates: Vec<CompressionRate>,
}

/// Ingestion and query entry point
pub struct KnowledgeService {
    config: Config,
    client: Arc<dyn LLMClient>,
    cache: Arc<TieredCache>,
    compressor: Compressor,
    router: QueryRouter,
}

impl KnowledgeService {
    /// Build the HTTP client and cache tiers described by `config`
    pub fn from_config(config: Config) -> Result<Self> {
        let model = config.resolve_model(&config.llm_service.model);
        let client = VLLMClient::new(config.llm_service.clone())?.with_model(model);

        let durable: Arc<dyn ObjectStore> = match config.cache.backend {
            DurableBackend::Sqlite => Arc::new(SqliteObjectStore::open(&config.cache.path)?),
            DurableBackend::Fs => Arc::new(FsObjectStore::new(&config.cache.path)),
        };
        tracing::debug!(
            "Durable tier: {:?} at {}",
            config.cache.backend,
            config.cache.path.display()
        );

        let cache = TieredCache::new(Arc::new(MemoryFastTier::new()), durable)
            .with_ttl(config.cache.fast_ttl())
            .with_op_timeout(config.cache.op_timeout())
            .with_read_attempts(config.cache.read_attempts);

        Ok(Self::new(config, Arc::new(client), Arc::new(cache)))
    }

    pub fn new(config: Config, client: Arc<dyn LLMClient>, cache: Arc<TieredCache>) -> Self {
        let policy = config.retry_policy();
        let compressor = Compressor::new(client.clone(), cache.clone(), config.compression.clone())
            .with_retry_policy(policy);
        let router = QueryRouter::new(client.clone(), cache.clone(), config.routing.clone(), policy);

        Self {
            config,
            client,
            cache,
            compressor,
            router,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn client(&self) -> &Arc<dyn LLMClient> {
        &self.client
    }

    pub fn cache(&self) -> &Arc<TieredCache> {
        &self.cache
    }

    pub fn router(&self) -> &QueryRouter {
        &self.router
    }

    /// Chunk `raw_text` and compress it at the requested rates
    pub async fn ingest(
        &self,
        task_type: &str,
        raw_text: &str,
        options: IngestOptions,
    ) -> Result<CompressionRun> {
        let settings = &self.config.compression;
        let text = if settings.clean_whitespace {
            clean_whitespace(raw_text)
        } else {
            raw_text.to_string()
        };

        let description = options
            .task_description
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| default_task_description(task_type));
        let few_shot = options.few_shot_examples.as_deref();
        let rates = if options.rates.is_empty() {
            CompressionRate::ALL.to_vec()
        } else {
            options.rates
        };

        if settings.strategy == CompressionStrategy::SinglePass {
            let chunks = chunk_text(&text, settings.chunk_size, settings.chunk_overlap)?;
            return self
                .compressor
                .compress_with_examples(task_type, &chunks, &description, few_shot, &rates)
                .await;
        }

        // Iterative runs fold chunks, so each chunk geometry gets its own pass
        let mut groups: BTreeMap<(usize, usize), Vec<CompressionRate>> = BTreeMap::new();
        for rate in rates {
            groups
                .entry(settings.chunk_geometry(rate))
                .or_default()
                .push(rate);
        }

        let mut merged: Option<CompressionRun> = None;
        for ((size, overlap), group) in groups {
            let chunks = chunk_text(&text, size, overlap)?;
            let run = self
                .compressor
                .compress_with_examples(task_type, &chunks, &description, few_shot, &group)
                .await?;
            match merged.as_mut() {
                Some(total) => {
                    total.entries.extend(run.entries);
                    total.failures.extend(run.failures);
                }
                None => merged = Some(run),
            }
        }

        merged.ok_or_else(|| {
            crate::error::TakcError::InvalidInput("No compression rates requested".to_string())
        })
    }

    pub async fn answer(&self, query: &Query) -> Result<QueryAnswer> {
        self.router.answer(query).await
    }

    pub async fn get(&self, task_type: &str, rate: CompressionRate) -> Result<CacheEntry> {
        self.cache.get(task_type, rate).await
    }

    pub async fn list(&self, task_type: Option<&str>) -> Result<Vec<(String, CompressionRate)>> {
        self.cache.list(task_type).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compress::EntrySource;
    use crate::error::TakcError;
    use crate::llm::CompletionRequest;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::TempDir;

    struct ShortClient {
        calls: AtomicU32,
    }

    #[async_trait]
    impl LLMClient for ShortClient {
        async fn complete(&self, _request: CompletionRequest) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("short summary".to_string())
        }

        fn model_name(&self) -> &str {
            "short"
        }
    }

    fn service(dir: &TempDir, strategy: CompressionStrategy) -> (KnowledgeService, Arc<ShortClient>) {
        let mut config = Config::default();
        config.compression.strategy = strategy;
        config.compression.base_delay_ms = 1;
        config.compression.chunk_size = 8;
        config.compression.chunk_overlap = 2;
        config.cache.backend = DurableBackend::Fs;
        config.cache.path = dir.path().to_path_buf();

        let client = Arc::new(ShortClient {
            calls: AtomicU32::new(0),
        });
        let cache = Arc::new(TieredCache::new(
            Arc::new(MemoryFastTier::new()),
            Arc::new(FsObjectStore::new(dir.path())),
        ));
        (KnowledgeService::new(config, client.clone(), cache), client)
    }

    #[tokio::test]
    async fn test_ingest_defaults_to_all_rates() {
        let dir = TempDir::new().unwrap();
        let (svc, client) = service(&dir, CompressionStrategy::SinglePass);
        let text = "one two three four five six seven eight nine ten eleven twelve";

        let run = svc.ingest("ops", text, IngestOptions::default()).await.unwrap();
        assert_eq!(run.entries.len(), 4);
        assert_eq!(client.calls.load(Ordering::SeqCst), 4);

        let entry = svc.get("ops", CompressionRate::Light).await.unwrap();
        assert_eq!(entry.metadata.original_tokens, 12);
        assert_eq!(entry.metadata.source, EntrySource::Primary);
        assert_eq!(
            entry.metadata.task_description,
            "Answer questions and perform analysis related to ops"
        );
        assert_eq!(svc.list(Some("ops")).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_iterative_ingest_uses_per_rate_geometry() {
        let dir = TempDir::new().unwrap();
        let (svc, client) = service(&dir, CompressionStrategy::Iterative);
        // 20 tokens: 8/2 windows give 3 chunks, 16/4 windows give 2
        let text = (1..=20).map(|i| format!("t{}", i)).collect::<Vec<_>>().join(" ");

        let options = IngestOptions {
            rates: vec![CompressionRate::High, CompressionRate::Light],
            ..Default::default()
        };
        let run = svc.ingest("ops", &text, options).await.unwrap();

        assert!(run.is_complete());
        assert_eq!(run.entries[&CompressionRate::High].metadata.chunks_processed, 3);
        assert_eq!(run.entries[&CompressionRate::Light].metadata.chunks_processed, 2);
        assert_eq!(client.calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_get_unknown_task_is_miss() {
        let dir = TempDir::new().unwrap();
        let (svc, _) = service(&dir, CompressionStrategy::SinglePass);
        assert!(matches!(
            svc.get("never", CompressionRate::High).await,
            Err(TakcError::CacheMiss { .. })
        ));
    }
}
