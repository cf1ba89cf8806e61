//! Configuration module for adbrief.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{ConversationPrompts, Prompts};
pub use settings::{
    ChatSettings, GeneralSettings, PipelineSettings, PromptSettings, SearchProvider,
    SearchSettings, SentinelPolicy, ServerSettings, Settings, TranscriptionMode,
    TranscriptionSettings,
};
