//! In-memory session store.
//!
//! Useful for testing and for running the server without a data directory.

use super::{validate_key, SessionStore};
use crate::error::Result;
use crate::session::SessionRecord;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

/// In-memory session store.
pub struct MemoryStore {
    records: RwLock<HashMap<String, SessionRecord>>,
}

impl MemoryStore {
    /// Create a new, empty store.
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn put(&self, id: &str, record: &SessionRecord) -> Result<()> {
        validate_key(id)?;
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        records.insert(id.to_string(), record.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<SessionRecord>> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        Ok(records.get(id).cloned())
    }

    async fn list_keys(&self) -> Result<BTreeSet<String>> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        Ok(records.keys().cloned().collect())
    }
}
