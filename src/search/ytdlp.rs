//! yt-dlp backed YouTube search.

use super::{VideoCandidate, VideoSearch};
use crate::error::{AdbriefError, Result};
use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, instrument};

/// Fields lifted into typed candidate fields; everything else goes to `extra`.
const KNOWN_FIELDS: &[&str] = &[
    "id", "url", "title", "channel", "uploader", "description", "thumbnail", "thumbnails",
    "_type", "ie_key", "timestamp", "upload_date",
];

/// Searches YouTube with `yt-dlp "ytsearchN:<query>"`.
pub struct YtDlpSearch {
    video_id_regex: Regex,
    max_results: usize,
}

impl YtDlpSearch {
    pub fn new(max_results: usize) -> Self {
        // Matches various YouTube URL formats and bare video IDs
        let video_id_regex = Regex::new(
            r"(?x)
            (?:
                (?:https?://)?
                (?:www\.)?
                (?:youtube\.com/watch\?v=|youtu\.be/|youtube\.com/embed/|youtube\.com/shorts/)
                ([a-zA-Z0-9_-]{11})
            )
            |
            ^([a-zA-Z0-9_-]{11})$
        ",
        )
        .expect("Invalid regex");

        Self {
            video_id_regex,
            max_results,
        }
    }

    /// Extract video ID from a YouTube URL or bare ID.
    fn extract_video_id(&self, input: &str) -> Option<String> {
        let caps = self.video_id_regex.captures(input.trim())?;

        caps.get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str().to_string())
    }

    /// Parse `--dump-json --flat-playlist` output, one JSON object per line.
    fn parse_output(&self, stdout: &str) -> Vec<VideoCandidate> {
        let mut candidates = Vec::new();

        for line in stdout.lines() {
            if line.trim().is_empty() {
                continue;
            }

            let json = match serde_json::from_str::<serde_json::Value>(line) {
                Ok(serde_json::Value::Object(map)) => map,
                _ => {
                    debug!("Skipping unparseable yt-dlp line");
                    continue;
                }
            };

            let video_id = json
                .get("id")
                .and_then(|v| v.as_str())
                .or_else(|| json.get("url").and_then(|v| v.as_str()))
                .map(|s| self.extract_video_id(s).unwrap_or_else(|| s.to_string()));

            let Some(video_id) = video_id else {
                continue;
            };

            let text = |key: &str| json.get(key).and_then(|v| v.as_str()).map(|s| s.to_string());

            let mut candidate = VideoCandidate::new(
                video_id.clone(),
                VideoCandidate::youtube_link(&video_id),
                text("title").unwrap_or_else(|| "Unknown Title".to_string()),
            );
            candidate.channel = text("channel").or_else(|| text("uploader"));
            candidate.description = text("description");
            candidate.thumbnail = text("thumbnail").or_else(|| {
                json.get("thumbnails")
                    .and_then(|t| t.as_array())
                    .and_then(|t| t.last())
                    .and_then(|t| t["url"].as_str())
                    .map(|s| s.to_string())
            });
            candidate.published_at = json
                .get("timestamp")
                .and_then(|t| t.as_i64())
                .and_then(|t| chrono::DateTime::from_timestamp(t, 0));
            candidate.extra = json
                .iter()
                .filter(|(k, v)| !KNOWN_FIELDS.contains(&k.as_str()) && !v.is_null())
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();

            candidates.push(candidate);
        }

        candidates
    }
}

impl Default for YtDlpSearch {
    fn default() -> Self {
        Self::new(5)
    }
}

#[async_trait]
impl VideoSearch for YtDlpSearch {
    #[instrument(skip(self))]
    async fn search(&self, query: &str) -> Result<Vec<VideoCandidate>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AdbriefError::InvalidInput("Search query is empty".to_string()));
        }

        let target = format!("ytsearch{}:{}", self.max_results, query);

        let output = tokio::process::Command::new("yt-dlp")
            .args(["--dump-json", "--flat-playlist", "--no-warnings", "--ignore-errors", &target])
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    AdbriefError::ToolNotFound("yt-dlp".to_string())
                } else {
                    AdbriefError::retryable(format!("Failed to run yt-dlp: {}", e))
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AdbriefError::retryable(format!("yt-dlp search failed: {}", stderr.trim())));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let candidates = self.parse_output(&stdout);
        debug!("Search returned {} candidates", candidates.len());
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_video_id() {
        let source = YtDlpSearch::default();

        assert_eq!(
            source.extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
        assert_eq!(
            source.extract_video_id("https://youtu.be/dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
        assert_eq!(
            source.extract_video_id("https://youtube.com/shorts/dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
        assert_eq!(source.extract_video_id("dQw4w9WgXcQ"), Some("dQw4w9WgXcQ".to_string()));
        assert_eq!(source.extract_video_id("not-a-video-id"), None);
    }

    #[test]
    fn test_parse_output() {
        let source = YtDlpSearch::default();
        let stdout = concat!(
            r#"{"_type": "url", "id": "aaaaaaaaaaa", "url": "https://www.youtube.com/watch?v=aaaaaaaaaaa", "title": "Run Faster", "channel": "Track Co", "duration": 30.0, "view_count": 10}"#,
            "\n",
            "not json\n",
            "\n",
            r#"{"url": "https://youtu.be/bbbbbbbbbbb", "uploader": "Campus Ads", "timestamp": 1700000000}"#,
            "\n",
        );

        let candidates = source.parse_output(stdout);
        assert_eq!(candidates.len(), 2);

        assert_eq!(candidates[0].id, "aaaaaaaaaaa");
        assert_eq!(candidates[0].title, "Run Faster");
        assert_eq!(candidates[0].channel.as_deref(), Some("Track Co"));
        assert_eq!(candidates[0].extra["view_count"], 10);
        assert!(!candidates[0].extra.contains_key("_type"));

        assert_eq!(candidates[1].id, "bbbbbbbbbbb");
        assert_eq!(candidates[1].link, "https://www.youtube.com/watch?v=bbbbbbbbbbb");
        assert_eq!(candidates[1].title, "Unknown Title");
        assert_eq!(candidates[1].channel.as_deref(), Some("Campus Ads"));
        assert!(candidates[1].published_at.is_some());
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let source = YtDlpSearch::default();
        let err = source.search("   ").await.unwrap_err();
        assert!(matches!(err, AdbriefError::InvalidInput(_)));
    }
}
