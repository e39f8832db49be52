//! Object storage operations

use super::Database;
use crate::error::Result;
use chrono::Utc;
use rusqlite::params;
use sha2::{Digest, Sha256};

/// Hash content using SHA-256
pub fn hash_content(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

/// Stored object summary
#[derive(Debug, Clone, serde::Serialize)]
pub struct ObjectInfo {
    pub key: String,
    pub size: usize,
    pub content_hash: String,
    pub updated_at: String,
}

impl Database {
    /// Insert or wholly replace an object
    pub fn put_object(&self, key: &str, body: &[u8]) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let hash = hash_content(body);
        self.conn()?.execute(
            "INSERT OR REPLACE INTO objects (key, body, content_hash, size, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![key, body, hash, body.len() as i64, now],
        )?;
        Ok(())
    }

    /// Get object bytes by key
    pub fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let result = self.conn()?.query_row(
            "SELECT body FROM objects WHERE key = ?1",
            params![key],
            |row| row.get(0),
        );
        match result {
            Ok(body) => Ok(Some(body)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// List objects whose key starts with `prefix`, ordered by key
    pub fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectInfo>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT key, size, content_hash, updated_at FROM objects
             WHERE substr(key, 1, length(?1)) = ?1
             ORDER BY key",
        )?;
        let rows = stmt.query_map(params![prefix], |row| {
            Ok(ObjectInfo {
                key: row.get(0)?,
                size: row.get::<_, i64>(1)? as usize,
                content_hash: row.get(2)?,
                updated_at: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }
}
