//! Transcription module for adbrief.
//!
//! Speech-to-text over an OpenAI-compatible audio API. The pipeline hands the
//! client raw audio bytes and gets plain text back.

mod whisper;

pub use whisper::WhisperTranscriber;

use crate::error::Result;
use async_trait::async_trait;

/// Audio payload sent for transcription.
#[derive(Debug, Clone)]
pub struct AudioClip {
    /// File name reported to the provider; its extension tells it the format.
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl AudioClip {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Trait for transcription services.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe an audio clip to text.
    async fn transcribe(&self, audio: AudioClip) -> Result<String>;
}
