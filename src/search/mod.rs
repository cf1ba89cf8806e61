//! Video search abstraction for adbrief.
//!
//! A search provider turns the derived query into an ordered list of candidate
//! videos. Provider-specific fields the pipeline does not interpret are carried
//! through untouched in [`VideoCandidate::extra`].

mod youtube_api;
mod ytdlp;

pub use youtube_api::YoutubeApiSearch;
pub use ytdlp::YtDlpSearch;

use crate::config::{SearchProvider, Settings};
use crate::error::{AdbriefError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A video returned by a search provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoCandidate {
    /// Provider identity of the video.
    pub id: String,
    /// Locator the audio fetcher downloads from.
    pub link: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    /// Opaque provider metadata.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl VideoCandidate {
    /// Create a candidate with only identity, locator and title.
    pub fn new(id: impl Into<String>, link: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            link: link.into(),
            title: title.into(),
            channel: None,
            description: None,
            thumbnail: None,
            published_at: None,
            extra: serde_json::Map::new(),
        }
    }

    /// Watch URL for a YouTube video id.
    pub fn youtube_link(video_id: &str) -> String {
        format!("https://www.youtube.com/watch?v={}", video_id)
    }
}

/// Trait for video search providers.
#[async_trait]
pub trait VideoSearch: Send + Sync {
    /// Search for videos matching `query`, best match first.
    async fn search(&self, query: &str) -> Result<Vec<VideoCandidate>>;
}

/// Build the configured search provider.
pub fn create_search(settings: &Settings) -> Result<Arc<dyn VideoSearch>> {
    let limit = settings.search.max_results.max(1);
    match settings.search.provider {
        SearchProvider::Ytdlp => Ok(Arc::new(YtDlpSearch::new(limit))),
        SearchProvider::YoutubeApi => {
            let key = settings
                .search
                .api_key
                .clone()
                .or_else(|| std::env::var("YOUTUBE_API_KEY").ok())
                .filter(|k| !k.is_empty())
                .ok_or_else(|| {
                    AdbriefError::Config(
                        "search.api_key or YOUTUBE_API_KEY is required for the youtube_api provider"
                            .to_string(),
                    )
                })?;
            Ok(Arc::new(YoutubeApiSearch::new(key, limit)?))
        }
    }
}
