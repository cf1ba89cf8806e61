//! Transcript artifact storage.

use crate::audio::sanitize_id;
use crate::error::{AdbriefError, Result};
use crate::store::write_atomic;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A transcript written for one video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptArtifact {
    pub video_id: String,
    pub text: String,
    pub path: PathBuf,
}

/// Plain-text transcripts, one `<video id>.txt` per video.
///
/// Saving again for the same video replaces the previous file atomically.
#[derive(Debug, Clone)]
pub struct TranscriptStore {
    dir: PathBuf,
}

impl TranscriptStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, video_id: &str) -> PathBuf {
        self.dir.join(format!("{}.txt", sanitize_id(video_id)))
    }

    pub async fn save(&self, video_id: &str, text: &str) -> Result<TranscriptArtifact> {
        let path = self.path_for(video_id);
        write_atomic(&path, text.as_bytes().to_vec())
            .await
            .map_err(|e| AdbriefError::Persistence(format!("Failed to write {}: {}", path.display(), e)))?;

        debug!("Saved transcript to {}", path.display());
        Ok(TranscriptArtifact {
            video_id: video_id.to_string(),
            text: text.to_string(),
            path,
        })
    }

    pub async fn load(&self, video_id: &str) -> Result<Option<String>> {
        match tokio::fs::read_to_string(self.path_for(video_id)).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = TranscriptStore::new(dir.path().join("transcripts"));

        assert_eq!(store.load("vid").await.unwrap(), None);

        let first = store.save("vid", "old text").await.unwrap();
        let second = store.save("vid", "new text").await.unwrap();
        assert_eq!(first.path, second.path);
        assert_eq!(store.load("vid").await.unwrap().as_deref(), Some("new text"));
    }
}
