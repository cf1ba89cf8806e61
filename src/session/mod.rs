//! Session lifecycle.
//!
//! A session starts as a live conversation. Once the conversation completes,
//! the controller searches for candidate videos, records a provisional result
//! and hands the candidates to the media pipeline in the background. The
//! session record is the single source of truth clients poll for progress.

mod controller;

pub use controller::SessionController;

use crate::conversation::{Conversation, ConversationState, ConversationTurn};
use crate::pipeline::ProcessedVideo;
use crate::search::VideoCandidate;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Still collecting the brief.
    Active,
    /// Brief complete, candidates found. Processing may still be running.
    Completed,
    /// The conversation or the search failed.
    Failed,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Active => write!(f, "active"),
            SessionStatus::Completed => write!(f, "completed"),
            SessionStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Everything known about one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Search query derived from the conversation.
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub conversation: Vec<ConversationTurn>,
    #[serde(default)]
    pub youtube_results: Vec<VideoCandidate>,
    /// Pipeline output, present once processing finished.
    #[serde(default)]
    pub processed_results: Option<Vec<ProcessedVideo>>,
    #[serde(default)]
    pub processed: bool,
    #[serde(default)]
    pub error: Option<String>,
    /// Set when the last write to the durable store failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistence_error: Option<String>,
}

impl SessionRecord {
    /// Snapshot of a conversation that is still collecting.
    pub fn active(conversation: &Conversation) -> Self {
        let status = match conversation.state {
            ConversationState::Error => SessionStatus::Failed,
            ConversationState::Collecting | ConversationState::Complete => SessionStatus::Active,
        };
        Self {
            session_id: conversation.session_id.clone(),
            status,
            created_at: conversation.created_at,
            updated_at: Utc::now(),
            query: None,
            conversation: conversation.turns().to_vec(),
            youtube_results: Vec::new(),
            processed_results: None,
            processed: false,
            error: None,
            persistence_error: None,
        }
    }

    /// Whether the background pipeline is still expected to update this record.
    pub fn is_processing(&self) -> bool {
        self.status == SessionStatus::Completed && !self.processed && self.error.is_none()
    }

    /// Number of processed videos that ended with an error.
    pub fn failed_items(&self) -> usize {
        self.processed_results
            .as_ref()
            .map(|results| results.iter().filter(|r| !r.is_ok()).count())
            .unwrap_or(0)
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Reply to `POST /chat/start`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartResponse {
    pub session_id: String,
    pub message: String,
    pub is_complete: bool,
}

/// Reply to one user message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub message: String,
    pub is_complete: bool,
    pub session_id: String,
    pub youtube_results: Option<Vec<VideoCandidate>>,
    pub processed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ItemStage;

    #[test]
    fn test_active_record_from_conversation() {
        let conversation = Conversation::new("s1", "system");
        let record = SessionRecord::active(&conversation);

        assert_eq!(record.status, SessionStatus::Active);
        assert_eq!(record.conversation.len(), 1);
        assert!(!record.processed);
        assert!(!record.is_processing());
    }

    #[test]
    fn test_record_json_shape() {
        let mut record = SessionRecord::active(&Conversation::new("s1", "system"));
        record.status = SessionStatus::Completed;
        record.processed = true;
        record.processed_results = Some(vec![ProcessedVideo::failed(
            VideoCandidate::new("v", "https://example.com/v", "V"),
            ItemStage::Fetch,
            "gone",
        )]);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["status"], "completed");
        assert_eq!(json["conversation"][0]["role"], "system");
        assert_eq!(json["processed_results"][0]["id"], "v");
        assert!(json.get("persistence_error").is_none());

        let back: SessionRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back.failed_items(), 1);
        assert!(back.processed_results.unwrap()[0].error.is_some());
    }
}
