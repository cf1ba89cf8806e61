//! Configuration settings for adbrief.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub chat: ChatSettings,
    pub transcription: TranscriptionSettings,
    pub search: SearchSettings,
    pub pipeline: PipelineSettings,
    pub server: ServerSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for session records and transcripts.
    pub data_dir: String,
    /// Directory for downloaded audio.
    pub temp_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.adbrief".to_string(),
            temp_dir: "/tmp/adbrief".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Where the completion sentinel may appear in a chat response.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SentinelPolicy {
    /// The sentinel must open the response (after whitespace or markdown emphasis).
    #[default]
    Leading,
    /// The sentinel may appear anywhere in the response.
    Anywhere,
}

impl std::str::FromStr for SentinelPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "leading" | "start" => Ok(SentinelPolicy::Leading),
            "anywhere" | "contains" => Ok(SentinelPolicy::Anywhere),
            _ => Err(format!("Unknown sentinel policy: {}", s)),
        }
    }
}

impl std::fmt::Display for SentinelPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SentinelPolicy::Leading => write!(f, "leading"),
            SentinelPolicy::Anywhere => write!(f, "anywhere"),
        }
    }
}

/// Chat completion settings for the brief-gathering conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    /// Chat model name.
    pub model: String,
    /// OpenAI-compatible API base URL.
    pub api_base: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Marker the model emits once it has enough information.
    pub sentinel: String,
    /// Where the sentinel is accepted.
    pub sentinel_policy: SentinelPolicy,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            model: "llama-3.3-70b-versatile".to_string(),
            api_base: "https://api.groq.com/openai/v1".to_string(),
            api_key_env: "GROQ_API_KEY".to_string(),
            temperature: 0.7,
            sentinel: "[SUFFICIENT]".to_string(),
            sentinel_policy: SentinelPolicy::Leading,
            timeout_secs: 60,
        }
    }
}

/// Which audio endpoint to call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptionMode {
    /// Transcribe in the spoken language.
    Transcribe,
    /// Translate speech to English text.
    #[default]
    Translate,
}

impl std::fmt::Display for TranscriptionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TranscriptionMode::Transcribe => write!(f, "transcribe"),
            TranscriptionMode::Translate => write!(f, "translate"),
        }
    }
}

/// Transcription service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionSettings {
    /// Speech-to-text model.
    pub model: String,
    /// Transcribe or translate.
    pub mode: TranscriptionMode,
    /// OpenAI-compatible API base URL.
    pub api_base: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Language hint (transcribe mode only).
    pub language: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Largest audio upload accepted by the provider, in megabytes.
    pub max_upload_mb: u64,
}

impl Default for TranscriptionSettings {
    fn default() -> Self {
        Self {
            model: "whisper-large-v3".to_string(),
            mode: TranscriptionMode::Translate,
            api_base: "https://api.groq.com/openai/v1".to_string(),
            api_key_env: "GROQ_API_KEY".to_string(),
            language: None,
            timeout_secs: 300,
            max_upload_mb: 25,
        }
    }
}

/// Video search provider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SearchProvider {
    /// `ytsearchN:` through yt-dlp, no API key required.
    #[default]
    Ytdlp,
    /// YouTube Data API v3.
    YoutubeApi,
}

impl std::str::FromStr for SearchProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ytdlp" | "yt-dlp" => Ok(SearchProvider::Ytdlp),
            "youtube_api" | "youtube" => Ok(SearchProvider::YoutubeApi),
            _ => Err(format!("Unknown search provider: {}", s)),
        }
    }
}

impl std::fmt::Display for SearchProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchProvider::Ytdlp => write!(f, "ytdlp"),
            SearchProvider::YoutubeApi => write!(f, "youtube_api"),
        }
    }
}

/// Video search settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub provider: SearchProvider,
    /// Number of candidates requested per search.
    pub max_results: usize,
    /// YouTube Data API key (youtube_api provider).
    pub api_key: Option<String>,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            provider: SearchProvider::Ytdlp,
            max_results: 5,
            api_key: None,
        }
    }
}

/// Media pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Maximum videos processed at once. 0 means no limit.
    pub max_concurrent_items: usize,
    /// Maximum concurrent downloads.
    pub max_concurrent_fetches: usize,
    /// Keep downloaded audio after transcription.
    pub keep_audio: bool,
    /// Leave failed videos out of the result set.
    pub drop_failed: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_concurrent_items: 0,
            max_concurrent_fetches: 4,
            keep_audio: false,
            drop_failed: false,
        }
    }
}

impl PipelineSettings {
    /// Item concurrency limit, `None` when unbounded.
    pub fn item_limit(&self) -> Option<usize> {
        (self.max_concurrent_items > 0).then_some(self.max_concurrent_items)
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::AdbriefError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("adbrief")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded temp directory path.
    pub fn temp_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.temp_dir)
    }

    /// Directory holding one JSON record per session.
    pub fn sessions_dir(&self) -> PathBuf {
        self.data_dir().join("sessions")
    }

    /// Directory holding transcript artifacts.
    pub fn transcripts_dir(&self) -> PathBuf {
        self.data_dir().join("transcripts")
    }

    /// Directory for downloaded audio.
    pub fn audio_dir(&self) -> PathBuf {
        self.temp_dir().join("audio")
    }
}
