//! Audio fetching.
//!
//! The fetcher turns a video locator into a local audio artifact. It is an
//! async trait so the pipeline can run many fetches concurrently without
//! blocking the runtime, and so tests can substitute a fake.

mod fetcher;

pub use fetcher::YtDlpFetcher;

use crate::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Container extension for fetched audio.
pub const AUDIO_EXTENSION: &str = "m4a";

/// Trait for audio fetchers.
#[async_trait]
pub trait AudioFetcher: Send + Sync {
    /// Download the audio behind `locator` into `output_dir`, named after
    /// `video_id`, and return the artifact path.
    async fn fetch(&self, locator: &str, video_id: &str, output_dir: &Path) -> Result<PathBuf>;
}

/// Make a provider id safe to use as a file name.
pub fn sanitize_id(video_id: &str) -> String {
    let cleaned: String = video_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();

    if cleaned.is_empty() {
        "unknown".to_string()
    } else {
        cleaned
    }
}

/// Deterministic artifact path for a video id.
pub fn artifact_path(output_dir: &Path, video_id: &str) -> PathBuf {
    output_dir.join(format!("{}.{}", sanitize_id(video_id), AUDIO_EXTENSION))
}
