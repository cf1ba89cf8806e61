//! Whisper transcription over an OpenAI-compatible API.

use super::{AudioClip, Transcriber};
use crate::config::{TranscriptionMode, TranscriptionSettings};
use crate::error::{AdbriefError, Result};
use crate::openai::{api_key_from_env, create_client};
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    AudioInput, AudioResponseFormat, CreateTranscriptionRequestArgs, CreateTranslationRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, instrument};

/// Whisper-based transcriber.
pub struct WhisperTranscriber {
    client: Client<OpenAIConfig>,
    model: String,
    mode: TranscriptionMode,
    language: Option<String>,
    max_upload_bytes: usize,
}

impl WhisperTranscriber {
    /// Create a transcriber from settings, reading the API key from the environment.
    pub fn from_settings(settings: &TranscriptionSettings) -> Result<Self> {
        let api_key = api_key_from_env(&settings.api_key_env)?;
        let client = create_client(
            &settings.api_base,
            &api_key,
            Duration::from_secs(settings.timeout_secs),
        )?;
        Ok(Self::with_client(client, settings))
    }

    /// Create a transcriber around an existing client.
    pub fn with_client(client: Client<OpenAIConfig>, settings: &TranscriptionSettings) -> Self {
        Self {
            client,
            model: settings.model.clone(),
            mode: settings.mode,
            language: settings.language.clone(),
            max_upload_bytes: (settings.max_upload_mb as usize).saturating_mul(1024 * 1024),
        }
    }

    fn check_input(&self, audio: &AudioClip) -> Result<()> {
        if audio.is_empty() {
            return Err(AdbriefError::Transcription(format!(
                "{} is empty",
                audio.file_name
            )));
        }
        if self.max_upload_bytes > 0 && audio.bytes.len() > self.max_upload_bytes {
            return Err(AdbriefError::Transcription(format!(
                "{} is {} bytes, over the {} byte upload limit",
                audio.file_name,
                audio.bytes.len(),
                self.max_upload_bytes
            )));
        }
        Ok(())
    }

    async fn transcribe_native(&self, audio: AudioClip) -> Result<String> {
        let mut request_builder = CreateTranscriptionRequestArgs::default();
        request_builder
            .file(AudioInput::from_vec_u8(audio.file_name, audio.bytes))
            .model(&self.model)
            .response_format(AudioResponseFormat::Json)
            .temperature(0.0);

        if let Some(lang) = &self.language {
            request_builder.language(lang);
        }

        let request = request_builder
            .build()
            .map_err(|e| AdbriefError::Transcription(format!("Failed to build request: {}", e)))?;

        let response = self
            .client
            .audio()
            .transcribe(request)
            .await
            .map_err(|e| AdbriefError::Transcription(format!("Transcription API error: {}", e)))?;

        Ok(response.text)
    }

    async fn translate(&self, audio: AudioClip) -> Result<String> {
        let request = CreateTranslationRequestArgs::default()
            .file(AudioInput::from_vec_u8(audio.file_name, audio.bytes))
            .model(&self.model)
            .response_format(AudioResponseFormat::Json)
            .temperature(0.0)
            .build()
            .map_err(|e| AdbriefError::Transcription(format!("Failed to build request: {}", e)))?;

        let response = self
            .client
            .audio()
            .translate(request)
            .await
            .map_err(|e| AdbriefError::Transcription(format!("Translation API error: {}", e)))?;

        Ok(response.text)
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    #[instrument(skip(self, audio), fields(file = %audio.file_name, bytes = audio.bytes.len()))]
    async fn transcribe(&self, audio: AudioClip) -> Result<String> {
        self.check_input(&audio)?;

        let text = match self.mode {
            TranscriptionMode::Transcribe => self.transcribe_native(audio).await?,
            TranscriptionMode::Translate => self.translate(audio).await?,
        };

        let text = text.trim().to_string();
        debug!("Transcribed {} characters", text.len());
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transcriber(max_upload_mb: u64) -> WhisperTranscriber {
        let settings = TranscriptionSettings {
            max_upload_mb,
            ..TranscriptionSettings::default()
        };
        let client = create_client(&settings.api_base, "test-key", Duration::from_secs(1)).unwrap();
        WhisperTranscriber::with_client(client, &settings)
    }

    #[tokio::test]
    async fn test_empty_audio_rejected() {
        let err = transcriber(25)
            .transcribe(AudioClip::new("a.m4a", Vec::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, AdbriefError::Transcription(_)));
    }

    #[test]
    fn test_upload_limit() {
        let t = transcriber(1);
        assert!(t.check_input(&AudioClip::new("a.m4a", vec![0; 1024])).is_ok());
        assert!(t.check_input(&AudioClip::new("a.m4a", vec![0; 2 * 1024 * 1024])).is_err());
    }
}
