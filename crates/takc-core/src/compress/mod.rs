//! Task-aware compression
//!
//! Turns a chunked document into one [`CacheEntry`] per [`CompressionRate`],
//! using the inference service when it answers and a deterministic sentence
//! scorer when it does not.

mod entry;
mod fallback;
mod orchestrator;
mod prompt;
mod rate;

pub use entry::{achieved_ratio, CacheEntry, EntryMetadata, EntrySource, ENTRY_SCHEMA_VERSION};
pub use fallback::{fallback_compress, split_sentences};
pub use orchestrator::{working_context, CompressionRun, Compressor};
pub use prompt::{compression_messages, default_task_description};
pub use rate::{CompressionRate, CompressionStrategy};
