//! Error types for adbrief.

use thiserror::Error;

/// Library-level error type for adbrief operations.
#[derive(Error, Debug)]
pub enum AdbriefError {
    #[error("Unknown session: {0}")]
    UnknownSession(String),

    #[error("Invalid session state: {0}")]
    InvalidSessionState(String),

    #[error("Collaborator error: {message}")]
    Collaborator { message: String, retryable: bool },

    #[error("Audio fetch failed: {0}")]
    Fetch(String),

    #[error("Transcription failed: {0}")]
    Transcription(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl AdbriefError {
    /// A chat or search provider failure the caller may retry.
    pub fn retryable(message: impl Into<String>) -> Self {
        Self::Collaborator {
            message: message.into(),
            retryable: true,
        }
    }

    /// A chat or search provider failure that retrying will not fix.
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Collaborator {
            message: message.into(),
            retryable: false,
        }
    }

    /// Re-wrap any error coming out of a provider call as a collaborator error,
    /// keeping its retryability.
    pub fn into_collaborator(self) -> Self {
        match self {
            e @ Self::Collaborator { .. } => e,
            other => Self::Collaborator {
                retryable: other.is_retryable(),
                message: other.to_string(),
            },
        }
    }

    /// Collaborator error for a failure that has already ended the session.
    pub fn into_fatal(self) -> Self {
        match self {
            Self::Collaborator { message, .. } => Self::fatal(message),
            other => Self::fatal(other.to_string()),
        }
    }

    /// Whether the failed operation can be retried unchanged.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Collaborator { retryable, .. } => *retryable,
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

/// Result type alias for adbrief operations.
pub type Result<T> = std::result::Result<T, AdbriefError>;
