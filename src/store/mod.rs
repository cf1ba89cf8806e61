//! Durable session storage.
//!
//! Provides a trait-based interface so the session controller can persist
//! records to disk in production and to memory in tests.

mod json;
mod memory;

pub use json::JsonFileStore;
pub use memory::MemoryStore;

use crate::error::{AdbriefError, Result};
use crate::session::SessionRecord;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::io::Write;
use std::path::Path;

/// Trait for session record stores.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert or replace the record stored under `id`.
    async fn put(&self, id: &str, record: &SessionRecord) -> Result<()>;

    /// Load the record stored under `id`.
    async fn get(&self, id: &str) -> Result<Option<SessionRecord>>;

    /// All stored session ids.
    async fn list_keys(&self) -> Result<BTreeSet<String>>;
}

/// Reject ids that could escape the store directory.
pub fn validate_key(id: &str) -> Result<()> {
    if id.is_empty()
        || id.contains('/')
        || id.contains('\\')
        || id.contains("..")
        || id.chars().any(char::is_control)
    {
        return Err(AdbriefError::InvalidInput(format!("Invalid session id: {:?}", id)));
    }
    Ok(())
}

/// Write `bytes` to `path` through a temp file in the same directory and an
/// atomic rename, so readers see either the old or the new content.
pub(crate) async fn write_atomic(path: &Path, bytes: Vec<u8>) -> std::io::Result<()> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(std::io::Error::other)?
}
