//! Chat completion collaborator.

use super::{ConversationTurn, Role};
use crate::config::ChatSettings;
use crate::error::{AdbriefError, Result};
use crate::openai::{api_key_from_env, classify_error, create_client};
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, instrument};

/// Produces the next assistant message for a conversation history.
#[async_trait]
pub trait ChatCompleter: Send + Sync {
    /// Complete `history`, returning the assistant's text.
    ///
    /// Failures are reported as [`AdbriefError::Collaborator`], with
    /// `retryable` telling the caller whether resending can succeed.
    async fn complete(&self, history: &[ConversationTurn]) -> Result<String>;
}

/// Chat completion against an OpenAI-compatible endpoint.
pub struct OpenAiChat {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
}

impl OpenAiChat {
    /// Create a chat client from settings, reading the API key from the environment.
    pub fn from_settings(settings: &ChatSettings) -> Result<Self> {
        let api_key = api_key_from_env(&settings.api_key_env)?;
        let client = create_client(
            &settings.api_base,
            &api_key,
            Duration::from_secs(settings.timeout_secs),
        )?;

        Ok(Self {
            client,
            model: settings.model.clone(),
            temperature: settings.temperature,
        })
    }

    fn to_request_message(turn: &ConversationTurn) -> Result<ChatCompletionRequestMessage> {
        let build_err = |e: async_openai::error::OpenAIError| AdbriefError::fatal(e.to_string());

        let message: ChatCompletionRequestMessage = match turn.role {
            Role::System => ChatCompletionRequestSystemMessageArgs::default()
                .content(turn.content.clone())
                .build()
                .map_err(build_err)?
                .into(),
            Role::User => ChatCompletionRequestUserMessageArgs::default()
                .content(turn.content.clone())
                .build()
                .map_err(build_err)?
                .into(),
            Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                .content(turn.content.clone())
                .build()
                .map_err(build_err)?
                .into(),
        };

        Ok(message)
    }
}

#[async_trait]
impl ChatCompleter for OpenAiChat {
    #[instrument(skip(self, history), fields(turns = history.len()))]
    async fn complete(&self, history: &[ConversationTurn]) -> Result<String> {
        let messages = history
            .iter()
            .map(Self::to_request_message)
            .collect::<Result<Vec<_>>>()?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(self.temperature)
            .build()
            .map_err(|e| AdbriefError::fatal(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| classify_error("Chat API error", e))?;

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| AdbriefError::retryable("Empty response from chat model"))?;

        debug!("Chat model returned {} characters", content.len());
        Ok(content)
    }
}
