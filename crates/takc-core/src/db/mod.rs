//! Database layer for takc
//!
//! SQLite-backed durable object storage.

mod objects;
mod schema;

pub use objects::{hash_content, ObjectInfo};
pub use schema::Database;
use std::path::PathBuf;

impl Database {
    /// Get the default database path
    pub fn default_path() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(crate::CACHE_DIR_NAME)
            .join("store.sqlite")
    }
}
