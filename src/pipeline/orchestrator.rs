//! Pipeline orchestrator.
//!
//! Fans the item pipeline out over a batch of candidates and folds the
//! outcomes into one result list.

use super::{ItemPipeline, ItemStage, ProcessedVideo, TranscriptStore};
use crate::audio::{AudioFetcher, YtDlpFetcher};
use crate::config::Settings;
use crate::error::Result;
use crate::search::VideoCandidate;
use crate::transcription::{Transcriber, WhisperTranscriber};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{error, info, instrument};

/// Runs the item pipeline for every candidate concurrently.
pub struct PipelineOrchestrator {
    item: Arc<ItemPipeline>,
    max_concurrent: Option<usize>,
    drop_failed: bool,
}

impl PipelineOrchestrator {
    /// Create an orchestrator with the yt-dlp fetcher and Whisper transcriber.
    pub fn new(settings: &Settings) -> Result<Self> {
        let fetcher: Arc<dyn AudioFetcher> =
            Arc::new(YtDlpFetcher::new(settings.pipeline.max_concurrent_fetches));
        let transcriber: Arc<dyn Transcriber> =
            Arc::new(WhisperTranscriber::from_settings(&settings.transcription)?);

        Ok(Self::with_components(settings, fetcher, transcriber))
    }

    /// Create an orchestrator with custom components.
    pub fn with_components(
        settings: &Settings,
        fetcher: Arc<dyn AudioFetcher>,
        transcriber: Arc<dyn Transcriber>,
    ) -> Self {
        let item = ItemPipeline::new(
            fetcher,
            transcriber,
            TranscriptStore::new(settings.transcripts_dir()),
            settings.audio_dir(),
        )
        .keep_audio(settings.pipeline.keep_audio);

        Self::from_item(item)
            .max_concurrent(settings.pipeline.item_limit())
            .drop_failed(settings.pipeline.drop_failed)
    }

    /// Wrap an item pipeline with unbounded fan-out.
    pub fn from_item(item: ItemPipeline) -> Self {
        Self {
            item: Arc::new(item),
            max_concurrent: None,
            drop_failed: false,
        }
    }

    /// Limit how many items run at once. `None` runs the whole batch at once.
    pub fn max_concurrent(mut self, limit: Option<usize>) -> Self {
        self.max_concurrent = limit.filter(|l| *l > 0);
        self
    }

    /// Leave failed items out of the result list.
    pub fn drop_failed(mut self, drop: bool) -> Self {
        self.drop_failed = drop;
        self
    }

    /// Process every candidate and return once all of them have finished.
    ///
    /// Results are in submission order. Each item runs in its own task, so a
    /// panicking item is reported as a `worker` failure for that item only.
    /// The only whole-batch error is failing to prepare the output directories.
    #[instrument(skip_all, fields(candidates = candidates.len()))]
    pub async fn process_all(&self, candidates: Vec<VideoCandidate>) -> Result<Vec<ProcessedVideo>> {
        self.item.prepare().await?;

        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let total = candidates.len();
        let limit = self.max_concurrent.unwrap_or(total).max(1);
        info!("Processing {} videos ({} at a time)", total, limit);

        let mut results: Vec<(usize, ProcessedVideo)> = stream::iter(candidates.into_iter().enumerate())
            .map(|(idx, candidate)| {
                let item = Arc::clone(&self.item);
                async move {
                    let fallback = candidate.clone();
                    let outcome = tokio::spawn(async move { item.run(candidate).await }).await;
                    let processed = match outcome {
                        Ok(processed) => processed,
                        Err(e) => {
                            error!("Item task for {} died: {}", fallback.id, e);
                            ProcessedVideo::failed(fallback, ItemStage::Worker, e.to_string())
                        }
                    };
                    (idx, processed)
                }
            })
            .buffer_unordered(limit)
            .collect()
            .await;

        results.sort_by_key(|(idx, _)| *idx);

        let succeeded = results.iter().filter(|(_, r)| r.is_ok()).count();
        info!("Processed {} videos: {} transcribed, {} failed", total, succeeded, total - succeeded);

        Ok(results
            .into_iter()
            .map(|(_, processed)| processed)
            .filter(|processed| !self.drop_failed || processed.is_ok())
            .collect())
    }
}
