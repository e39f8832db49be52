//! Ingestion preprocessing
//!
//! Token counting and overlapping chunking of raw text.

mod chunker;

pub use chunker::*;
