//! Media pipeline.
//!
//! For every candidate video: fetch audio, transcribe it, persist the
//! transcript. Each video is processed independently; a failure is recorded
//! on that video's result and never stops the others.

mod item;
mod orchestrator;
mod transcripts;

pub use item::ItemPipeline;
pub use orchestrator::PipelineOrchestrator;
pub use transcripts::{TranscriptArtifact, TranscriptStore};

use crate::search::VideoCandidate;
use serde::{Deserialize, Serialize};

/// Pipeline stage an item failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStage {
    Fetch,
    Transcribe,
    Persist,
    /// The item's task died before reporting a result.
    Worker,
}

impl std::fmt::Display for ItemStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemStage::Fetch => write!(f, "fetch"),
            ItemStage::Transcribe => write!(f, "transcribe"),
            ItemStage::Persist => write!(f, "persist"),
            ItemStage::Worker => write!(f, "worker"),
        }
    }
}

/// Why an item has no transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemError {
    pub stage: ItemStage,
    pub message: String,
}

/// A candidate video after the pipeline ran on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedVideo {
    #[serde(flatten)]
    pub video: VideoCandidate,
    pub transcript: Option<String>,
    pub error: Option<ItemError>,
}

impl ProcessedVideo {
    pub fn transcribed(video: VideoCandidate, transcript: String) -> Self {
        Self {
            video,
            transcript: Some(transcript),
            error: None,
        }
    }

    pub fn failed(video: VideoCandidate, stage: ItemStage, message: impl Into<String>) -> Self {
        Self {
            video,
            transcript: None,
            error: Some(ItemError {
                stage,
                message: message.into(),
            }),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processed_video_serialization() {
        let video = VideoCandidate::new("vid", "https://example.com/v", "Title");

        let ok = serde_json::to_value(ProcessedVideo::transcribed(video.clone(), "words".into())).unwrap();
        assert_eq!(ok["id"], "vid");
        assert_eq!(ok["transcript"], "words");
        assert!(ok["error"].is_null());

        let failed = serde_json::to_value(ProcessedVideo::failed(video, ItemStage::Fetch, "404")).unwrap();
        assert!(failed["transcript"].is_null());
        assert_eq!(failed["error"]["stage"], "fetch");
        assert_eq!(failed["error"]["message"], "404");
    }
}
