//! Per-video unit of work.

use super::{ItemStage, ProcessedVideo, TranscriptStore};
use crate::audio::AudioFetcher;
use crate::error::Result;
use crate::search::VideoCandidate;
use crate::transcription::{AudioClip, Transcriber};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Fetch, transcribe and persist one video.
pub struct ItemPipeline {
    fetcher: Arc<dyn AudioFetcher>,
    transcriber: Arc<dyn Transcriber>,
    transcripts: TranscriptStore,
    audio_dir: PathBuf,
    keep_audio: bool,
}

impl ItemPipeline {
    pub fn new(
        fetcher: Arc<dyn AudioFetcher>,
        transcriber: Arc<dyn Transcriber>,
        transcripts: TranscriptStore,
        audio_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            fetcher,
            transcriber,
            transcripts,
            audio_dir: audio_dir.into(),
            keep_audio: false,
        }
    }

    /// Keep downloaded audio on disk after transcription.
    pub fn keep_audio(mut self, keep: bool) -> Self {
        self.keep_audio = keep;
        self
    }

    pub fn transcripts(&self) -> &TranscriptStore {
        &self.transcripts
    }

    /// Create the audio and transcript directories.
    pub async fn prepare(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.audio_dir).await?;
        tokio::fs::create_dir_all(self.transcripts.dir()).await?;
        Ok(())
    }

    /// Run the pipeline for one candidate.
    ///
    /// Never fails: a stage error ends the run early and is recorded on the
    /// returned item.
    #[instrument(skip(self, candidate), fields(video_id = %candidate.id))]
    pub async fn run(&self, candidate: VideoCandidate) -> ProcessedVideo {
        let audio_path = match self
            .fetcher
            .fetch(&candidate.link, &candidate.id, &self.audio_dir)
            .await
        {
            Ok(path) => path,
            Err(e) => {
                warn!("Fetch failed: {}", e);
                return ProcessedVideo::failed(candidate, ItemStage::Fetch, e.to_string());
            }
        };

        let bytes = match tokio::fs::read(&audio_path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Audio unreadable: {}", e);
                return ProcessedVideo::failed(
                    candidate,
                    ItemStage::Transcribe,
                    format!("Unreadable audio {}: {}", audio_path.display(), e),
                );
            }
        };

        let file_name = audio_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio.m4a")
            .to_string();

        let transcript = self.transcriber.transcribe(AudioClip::new(file_name, bytes)).await;
        self.cleanup(&audio_path).await;

        let transcript = match transcript {
            Ok(text) => text,
            Err(e) => {
                warn!("Transcription failed: {}", e);
                return ProcessedVideo::failed(candidate, ItemStage::Transcribe, e.to_string());
            }
        };

        if let Err(e) = self.transcripts.save(&candidate.id, &transcript).await {
            warn!("Transcript not saved: {}", e);
            return ProcessedVideo::failed(candidate, ItemStage::Persist, e.to_string());
        }

        info!("Transcribed {} ({} characters)", candidate.title, transcript.len());
        ProcessedVideo::transcribed(candidate, transcript)
    }

    async fn cleanup(&self, audio_path: &std::path::Path) {
        if self.keep_audio {
            return;
        }
        if let Err(e) = tokio::fs::remove_file(audio_path).await {
            warn!("Failed to cleanup audio file: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::artifact_path;
    use crate::testing::{candidates, FakeFetcher, FakeTranscriber};

    fn pipeline(
        dir: &std::path::Path,
        fetcher: Arc<FakeFetcher>,
        transcriber: Arc<FakeTranscriber>,
    ) -> ItemPipeline {
        ItemPipeline::new(
            fetcher,
            transcriber,
            TranscriptStore::new(dir.join("transcripts")),
            dir.join("audio"),
        )
    }

    #[tokio::test]
    async fn test_success_persists_transcript_and_removes_audio() {
        let dir = tempfile::tempdir().unwrap();
        let item = pipeline(dir.path(), Arc::new(FakeFetcher::new()), Arc::new(FakeTranscriber::new()));
        item.prepare().await.unwrap();

        let candidate = candidates(1).remove(0);
        let result = item.run(candidate.clone()).await;

        assert!(result.is_ok());
        assert_eq!(result.video, candidate);
        assert_eq!(result.transcript.as_deref(), Some("transcript of audio for vid0"));
        assert_eq!(
            item.transcripts().load("vid0").await.unwrap().as_deref(),
            Some("transcript of audio for vid0")
        );
        assert!(!artifact_path(&dir.path().join("audio"), "vid0").exists());
    }

    #[tokio::test]
    async fn test_keep_audio() {
        let dir = tempfile::tempdir().unwrap();
        let item = pipeline(dir.path(), Arc::new(FakeFetcher::new()), Arc::new(FakeTranscriber::new()))
            .keep_audio(true);

        assert!(item.run(candidates(1).remove(0)).await.is_ok());
        assert!(artifact_path(&dir.path().join("audio"), "vid0").exists());
    }

    #[tokio::test]
    async fn test_fetch_failure_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        let transcriber = Arc::new(FakeTranscriber::new());
        let item = pipeline(dir.path(), Arc::new(FakeFetcher::failing_for(["vid0"])), transcriber.clone());

        let result = item.run(candidates(1).remove(0)).await;

        assert!(result.transcript.is_none());
        assert_eq!(result.error.as_ref().unwrap().stage, ItemStage::Fetch);
        assert_eq!(transcriber.calls(), 0);
        assert_eq!(item.transcripts().load("vid0").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_transcription_failure_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        let item = pipeline(
            dir.path(),
            Arc::new(FakeFetcher::new()),
            Arc::new(FakeTranscriber::failing_for(["vid0"])),
        );

        let result = item.run(candidates(1).remove(0)).await;

        assert!(result.transcript.is_none());
        assert_eq!(result.error.as_ref().unwrap().stage, ItemStage::Transcribe);
        assert_eq!(item.transcripts().load("vid0").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_rerun_after_failure_overwrites_transcript() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(FakeFetcher::new());
        let item = pipeline(dir.path(), fetcher.clone(), Arc::new(FakeTranscriber::new()));
        item.prepare().await.unwrap();

        // A stale artifact from some earlier run.
        item.transcripts().save("vid0", "stale").await.unwrap();

        fetcher.set_failing("vid0", true);
        let failed = item.run(candidates(1).remove(0)).await;
        assert!(!failed.is_ok());

        fetcher.set_failing("vid0", false);
        let retried = item.run(candidates(1).remove(0)).await;
        assert!(retried.is_ok());
        assert!(retried.error.is_none());
        assert_eq!(
            item.transcripts().load("vid0").await.unwrap(),
            retried.transcript
        );
    }
}
