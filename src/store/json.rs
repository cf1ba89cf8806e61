//! JSON file session store.

use super::{validate_key, write_atomic, SessionStore};
use crate::error::{AdbriefError, Result};
use crate::session::SessionRecord;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const FILE_PREFIX: &str = "session_";
const FILE_SUFFIX: &str = ".json";

/// One pretty-printed `session_<id>.json` file per session.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Create a store rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}{}{}", FILE_PREFIX, id, FILE_SUFFIX))
    }

    fn key_from_file_name(name: &str) -> Option<&str> {
        name.strip_prefix(FILE_PREFIX)?
            .strip_suffix(FILE_SUFFIX)
            .filter(|id| !id.is_empty())
    }
}

#[async_trait]
impl SessionStore for JsonFileStore {
    async fn put(&self, id: &str, record: &SessionRecord) -> Result<()> {
        validate_key(id)?;
        let path = self.path_for(id);
        let json = serde_json::to_vec_pretty(record)?;

        write_atomic(&path, json)
            .await
            .map_err(|e| AdbriefError::Persistence(format!("Failed to write {}: {}", path.display(), e)))?;

        debug!("Saved session {} to {}", id, path.display());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<SessionRecord>> {
        validate_key(id)?;
        let path = self.path_for(id);

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(AdbriefError::Persistence(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        let record = serde_json::from_str(&content).map_err(|e| {
            AdbriefError::Persistence(format!("Corrupt session file {}: {}", path.display(), e))
        })?;
        Ok(Some(record))
    }

    async fn list_keys(&self) -> Result<BTreeSet<String>> {
        let mut keys = BTreeSet::new();

        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(keys),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                warn!("Skipping non UTF-8 file in {}", self.dir.display());
                continue;
            };
            if let Some(id) = Self::key_from_file_name(name) {
                keys.insert(id.to_string());
            }
        }

        Ok(keys)
    }
}
