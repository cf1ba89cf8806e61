//! YouTube Data API v3 search.

use super::{VideoCandidate, VideoSearch};
use crate::error::{AdbriefError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

const SEARCH_ENDPOINT: &str = "https://www.googleapis.com/youtube/v3/search";

/// Searches YouTube through the Data API.
pub struct YoutubeApiSearch {
    client: reqwest::Client,
    api_key: String,
    max_results: usize,
    endpoint: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Deserialize)]
struct SearchItem {
    id: ItemId,
    snippet: Option<Snippet>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemId {
    video_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    #[serde(default)]
    title: String,
    channel_title: Option<String>,
    channel_id: Option<String>,
    description: Option<String>,
    published_at: Option<chrono::DateTime<chrono::Utc>>,
    live_broadcast_content: Option<String>,
    #[serde(default)]
    thumbnails: serde_json::Map<String, serde_json::Value>,
}

impl YoutubeApiSearch {
    pub fn new(api_key: String, max_results: usize) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            api_key,
            max_results,
            endpoint: SEARCH_ENDPOINT.to_string(),
        })
    }

    /// Convert an API response body into candidates, skipping non-video items.
    fn parse_response(body: &str) -> Result<Vec<VideoCandidate>> {
        let response: SearchResponse = serde_json::from_str(body)?;

        let candidates = response
            .items
            .into_iter()
            .filter_map(|item| {
                let video_id = item.id.video_id?;
                let snippet = item.snippet;
                let mut candidate = VideoCandidate::new(
                    video_id.clone(),
                    VideoCandidate::youtube_link(&video_id),
                    snippet.as_ref().map(|s| s.title.clone()).unwrap_or_default(),
                );

                if let Some(snippet) = snippet {
                    candidate.channel = snippet.channel_title;
                    candidate.description = snippet.description;
                    candidate.published_at = snippet.published_at;
                    candidate.thumbnail = ["high", "medium", "default"]
                        .iter()
                        .find_map(|size| snippet.thumbnails.get(*size))
                        .and_then(|t| t["url"].as_str())
                        .map(|s| s.to_string());
                    if let Some(channel_id) = snippet.channel_id {
                        candidate.extra.insert("channel_id".into(), channel_id.into());
                    }
                    if let Some(live) = snippet.live_broadcast_content {
                        candidate.extra.insert("live_broadcast_content".into(), live.into());
                    }
                }

                Some(candidate)
            })
            .collect();

        Ok(candidates)
    }
}

#[async_trait]
impl VideoSearch for YoutubeApiSearch {
    #[instrument(skip(self))]
    async fn search(&self, query: &str) -> Result<Vec<VideoCandidate>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AdbriefError::InvalidInput("Search query is empty".to_string()));
        }

        let max_results = self.max_results.to_string();
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("part", "snippet"),
                ("type", "video"),
                ("maxResults", max_results.as_str()),
                ("q", query),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AdbriefError::retryable(format!("YouTube API request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AdbriefError::retryable(format!("YouTube API read failed: {}", e)))?;

        if !status.is_success() {
            let message = format!("YouTube API returned {}: {}", status, body);
            return Err(if status.is_server_error() || status.as_u16() == 429 {
                AdbriefError::retryable(message)
            } else {
                AdbriefError::fatal(message)
            });
        }

        let candidates = Self::parse_response(&body)?;
        debug!("Search returned {} candidates", candidates.len());
        Ok(candidates)
    }
}
