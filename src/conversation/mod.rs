//! Brief-gathering conversation.
//!
//! A conversation collects turns until the chat model answers with the
//! completion sentinel, at which point the text after the sentinel becomes the
//! search query and the conversation is complete.

mod chat;
mod machine;

pub use chat::{ChatCompleter, OpenAiChat};
pub use machine::ConversationMachine;

use crate::config::SentinelPolicy;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Speaker of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// One message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// Conversation lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationState {
    Collecting,
    Complete,
    Error,
}

impl std::fmt::Display for ConversationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConversationState::Collecting => write!(f, "collecting"),
            ConversationState::Complete => write!(f, "complete"),
            ConversationState::Error => write!(f, "error"),
        }
    }
}

/// Dialogue history for one session.
///
/// Turns can only be appended; there is no API to edit or remove one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub session_id: String,
    pub state: ConversationState,
    turns: Vec<ConversationTurn>,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    /// A new collecting conversation seeded with a system turn.
    pub fn new(session_id: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            state: ConversationState::Collecting,
            turns: vec![ConversationTurn::system(system_prompt)],
            created_at: Utc::now(),
        }
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub(crate) fn push(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
    }
}

/// Result of advancing a conversation by one user message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// The model's raw response, sentinel included.
    pub message: String,
    /// Derived search query, present only when the conversation completed.
    pub query: Option<String>,
}

impl Reply {
    pub fn is_complete(&self) -> bool {
        self.query.is_some()
    }
}

/// Characters a model commonly wraps a leading marker in.
const LEADING_DECORATION: &[char] = &['*', '_', '>', '"', '`', '\''];

/// Find the completion sentinel in `response` and return the derived query.
///
/// Under [`SentinelPolicy::Leading`] the sentinel must be the first token once
/// whitespace and markdown decoration are skipped; under
/// [`SentinelPolicy::Anywhere`] its first occurrence counts. The query is the
/// text after the sentinel, trimmed of whitespace and wrapping quotes or
/// emphasis. An empty query means no completion.
pub fn detect_completion(response: &str, sentinel: &str, policy: SentinelPolicy) -> Option<String> {
    if sentinel.is_empty() {
        return None;
    }

    let remainder = match policy {
        SentinelPolicy::Leading => response
            .trim_start_matches(|c: char| c.is_whitespace() || LEADING_DECORATION.contains(&c))
            .strip_prefix(sentinel)?,
        SentinelPolicy::Anywhere => {
            let start = response.find(sentinel)?;
            &response[start + sentinel.len()..]
        }
    };

    let query = remainder.trim().trim_matches(LEADING_DECORATION).trim();

    if query.is_empty() {
        None
    } else {
        Some(query.to_string())
    }
}
