//! Audio download and extraction.
//!
//! Downloads the audio track of a video with yt-dlp and normalizes it to m4a
//! with ffmpeg. Output names are derived from the video id, so a re-fetch
//! overwrites the previous artifact.

use super::{artifact_path, sanitize_id, AudioFetcher, AUDIO_EXTENSION};
use crate::error::{AdbriefError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument};

/// Fetches audio with yt-dlp, bounded by a pool of download permits.
pub struct YtDlpFetcher {
    permits: Arc<Semaphore>,
}

impl YtDlpFetcher {
    /// Create a fetcher that runs at most `max_concurrent` downloads at once.
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }
}

impl Default for YtDlpFetcher {
    fn default() -> Self {
        Self::new(4)
    }
}

#[async_trait]
impl AudioFetcher for YtDlpFetcher {
    #[instrument(skip(self, output_dir), fields(video_id = %video_id))]
    async fn fetch(&self, locator: &str, video_id: &str, output_dir: &Path) -> Result<PathBuf> {
        validate_locator(locator)?;
        tokio::fs::create_dir_all(output_dir).await?;

        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| AdbriefError::Fetch("Fetch pool is closed".into()))?;

        let stem = sanitize_id(video_id);
        let target_path = artifact_path(output_dir, video_id);
        remove_previous_outputs(output_dir, &stem).await?;

        info!("Downloading audio from {}", locator);

        let template = output_dir.join(format!("{}.%(ext)s", stem));

        let result = Command::new("yt-dlp")
            .arg("--format").arg("bestaudio/best")
            .arg("--extract-audio")
            .arg("--audio-format").arg(AUDIO_EXTENSION)
            .arg("--output").arg(&template)
            .arg("--force-overwrites")
            .arg("--no-playlist")
            .arg("--quiet")
            .arg("--no-warnings")
            .arg(locator)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await;

        let output = match result {
            Ok(o) => o,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AdbriefError::ToolNotFound("yt-dlp".into()));
            }
            Err(e) => {
                return Err(AdbriefError::Fetch(format!("yt-dlp execution failed: {e}")));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AdbriefError::Fetch(format!("yt-dlp failed: {}", stderr.trim())));
        }

        let downloaded = find_audio_file(output_dir, &stem).await?;

        if downloaded != target_path {
            normalize_to_m4a(&downloaded, &target_path).await?;
            let _ = tokio::fs::remove_file(&downloaded).await;
        }

        Ok(target_path)
    }
}

/// Only http(s) locators are downloadable.
fn validate_locator(locator: &str) -> Result<()> {
    let url = url::Url::parse(locator)
        .map_err(|e| AdbriefError::Fetch(format!("Unsupported source '{}': {}", locator, e)))?;

    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(()),
        scheme => Err(AdbriefError::Fetch(format!(
            "Unsupported source '{}': scheme {} is not downloadable",
            locator, scheme
        ))),
    }
}

/// Delete earlier outputs for the same stem so a stale file is never picked up.
async fn remove_previous_outputs(dir: &Path, stem: &str) -> Result<()> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if file_stem_matches(&entry.path(), stem) {
            debug!("Removing previous output {:?}", entry.path());
            tokio::fs::remove_file(entry.path()).await?;
        }
    }
    Ok(())
}

fn file_stem_matches(path: &Path, stem: &str) -> bool {
    path.file_stem().and_then(|s| s.to_str()) == Some(stem)
}

/// Locates a downloaded audio file by its stem.
async fn find_audio_file(dir: &Path, stem: &str) -> Result<PathBuf> {
    // Common audio formats that yt-dlp may produce
    for ext in &[AUDIO_EXTENSION, "mp3", "opus", "webm", "ogg", "aac"] {
        let candidate = dir.join(format!("{}.{}", stem, ext));
        if tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
            return Ok(candidate);
        }
    }

    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| AdbriefError::Fetch(format!("Cannot read directory: {e}")))?;

    while let Ok(Some(entry)) = entries.next_entry().await {
        if file_stem_matches(&entry.path(), stem) {
            return Ok(entry.path());
        }
    }

    Err(AdbriefError::Fetch("Audio file not found after download".into()))
}

/// Converts an audio file to AAC in an m4a container using ffmpeg.
async fn normalize_to_m4a(source: &Path, dest: &Path) -> Result<()> {
    debug!("Converting {:?} to m4a", source);

    let result = Command::new("ffmpeg")
        .arg("-i").arg(source)
        .arg("-vn")
        .arg("-codec:a").arg("aac")
        .arg("-b:a").arg("128k")
        .arg("-y")
        .arg("-loglevel").arg("error")
        .arg(dest)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await;

    match result {
        Ok(out) if out.status.success() => Ok(()),
        Ok(out) => {
            let err = String::from_utf8_lossy(&out.stderr);
            Err(AdbriefError::Fetch(format!("ffmpeg conversion failed: {}", err.trim())))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(AdbriefError::ToolNotFound("ffmpeg".into()))
        }
        Err(e) => Err(AdbriefError::Fetch(format!("ffmpeg error: {e}"))),
    }
}
