//! Conversation state machine.

use super::{detect_completion, ChatCompleter, Conversation, ConversationState, ConversationTurn, Reply};
use crate::config::{Prompts, SentinelPolicy};
use crate::error::{AdbriefError, Result};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, instrument, warn};

/// Owns the live conversations and advances them through the chat model.
///
/// Each conversation sits behind its own mutex, held for the whole of an
/// [`advance`](Self::advance) call, so messages for one session are applied one
/// at a time in arrival order while different sessions proceed in parallel.
pub struct ConversationMachine {
    chat: Arc<dyn ChatCompleter>,
    prompts: Prompts,
    sentinel: String,
    policy: SentinelPolicy,
    conversations: RwLock<HashMap<String, Arc<Mutex<Conversation>>>>,
}

impl ConversationMachine {
    pub fn new(
        chat: Arc<dyn ChatCompleter>,
        prompts: Prompts,
        sentinel: impl Into<String>,
        policy: SentinelPolicy,
    ) -> Self {
        Self {
            chat,
            prompts,
            sentinel: sentinel.into(),
            policy,
            conversations: RwLock::new(HashMap::new()),
        }
    }

    /// Open a new conversation. Returns a snapshot of it and the greeting.
    pub async fn start(&self) -> (Conversation, String) {
        let mut conversations = self.conversations.write().await;

        let base = Utc::now().format("%Y%m%d_%H%M%S_%6f").to_string();
        let mut session_id = base.clone();
        let mut suffix = 1;
        while conversations.contains_key(&session_id) {
            session_id = format!("{}_{}", base, suffix);
            suffix += 1;
        }

        let conversation = Conversation::new(&session_id, self.prompts.system_prompt(&self.sentinel));
        let snapshot = conversation.clone();
        conversations.insert(session_id.clone(), Arc::new(Mutex::new(conversation)));

        info!("Started conversation {}", session_id);
        (snapshot, self.prompts.greeting())
    }

    async fn lookup(&self, session_id: &str) -> Result<Arc<Mutex<Conversation>>> {
        self.conversations
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| AdbriefError::UnknownSession(session_id.to_string()))
    }

    /// Send one user message and apply the model's answer.
    ///
    /// On a retryable chat failure nothing is recorded, so the same message can
    /// be sent again. A non-retryable failure records the user turn and moves
    /// the conversation to [`ConversationState::Error`].
    #[instrument(skip(self, user_message))]
    pub async fn advance(&self, session_id: &str, user_message: &str) -> Result<Reply> {
        if user_message.trim().is_empty() {
            return Err(AdbriefError::InvalidInput("Message is empty".to_string()));
        }

        let handle = self.lookup(session_id).await?;
        let mut conversation = handle.lock().await;

        if conversation.state != ConversationState::Collecting {
            return Err(AdbriefError::InvalidSessionState(format!(
                "session {} is {}",
                session_id, conversation.state
            )));
        }

        let user_turn = ConversationTurn::user(user_message);
        let mut history = conversation.turns().to_vec();
        history.push(user_turn.clone());

        let response = match self.chat.complete(&history).await {
            Ok(response) => response,
            Err(e) => {
                let e = e.into_collaborator();
                if e.is_retryable() {
                    warn!("Chat failed for {}, turn not recorded: {}", session_id, e);
                } else {
                    warn!("Chat failed permanently for {}: {}", session_id, e);
                    conversation.push(user_turn);
                    conversation.state = ConversationState::Error;
                }
                return Err(e);
            }
        };

        conversation.push(user_turn);

        match detect_completion(&response, &self.sentinel, self.policy) {
            Some(query) => {
                info!("Conversation {} complete, query: {}", session_id, query);
                conversation.state = ConversationState::Complete;
                Ok(Reply { message: response, query: Some(query) })
            }
            None => {
                conversation.push(ConversationTurn::assistant(response.clone()));
                Ok(Reply { message: response, query: None })
            }
        }
    }

    /// Current copy of a live conversation.
    pub async fn snapshot(&self, session_id: &str) -> Option<Conversation> {
        let handle = self.conversations.read().await.get(session_id).cloned()?;
        let conversation = handle.lock().await;
        Some(conversation.clone())
    }

    /// Drop a conversation whose history is no longer needed.
    pub async fn retire(&self, session_id: &str) -> bool {
        self.conversations.write().await.remove(session_id).is_some()
    }

    /// Ids of conversations still held in memory.
    pub async fn live_ids(&self) -> Vec<String> {
        self.conversations.read().await.keys().cloned().collect()
    }
}
