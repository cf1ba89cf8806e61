//! Pre-flight checks before expensive operations.
//!
//! Validates that required tools and configuration are available
//! before starting operations that would otherwise fail midway.

use crate::config::{SearchProvider, Settings};
use crate::error::{AdbriefError, Result};
use std::process::Command;

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Conversations need the chat key, then everything processing needs.
    Converse,
    /// Processing needs the search tool or key, the download tools and the
    /// transcription key.
    Process,
    /// Reading stored sessions.
    Inspect,
}

/// Run pre-flight checks for the given operation.
///
/// Returns Ok(()) if all checks pass, or an error describing what's missing.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    match operation {
        Operation::Converse => {
            check_api_key(&settings.chat.api_key_env)?;
            check_processing(settings)?;
        }
        Operation::Process => {
            check_processing(settings)?;
        }
        Operation::Inspect => {
            // Stored sessions are plain files
        }
    }
    Ok(())
}

fn check_processing(settings: &Settings) -> Result<()> {
    check_api_key(&settings.transcription.api_key_env)?;
    if settings.search.provider == SearchProvider::YoutubeApi
        && settings.search.api_key.as_deref().map_or(true, str::is_empty)
    {
        check_api_key("YOUTUBE_API_KEY")?;
    }
    check_tool("yt-dlp")?;
    check_tool("ffmpeg")?;
    Ok(())
}

/// Check that the API key variable `var` is set.
fn check_api_key(var: &str) -> Result<()> {
    match std::env::var(var) {
        Ok(key) if !key.is_empty() => Ok(()),
        Ok(_) => Err(AdbriefError::Config(format!(
            "{} is empty. Set it with: export {}='...'",
            var, var
        ))),
        Err(_) => Err(AdbriefError::Config(format!(
            "{} not set. Set it with: export {}='...'",
            var, var
        ))),
    }
}

/// Check if an external tool is available.
fn check_tool(name: &str) -> Result<()> {
    // ffmpeg uses -version (single dash), others use --version
    let version_arg = match name {
        "ffmpeg" | "ffprobe" => "-version",
        _ => "--version",
    };
    match Command::new(name).arg(version_arg).output() {
        Ok(output) if output.status.success() => Ok(()),
        Ok(_) => Err(AdbriefError::ToolNotFound(format!(
            "{} is installed but not working correctly",
            name
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(AdbriefError::ToolNotFound(name.to_string()))
        }
        Err(e) => Err(AdbriefError::ToolNotFound(format!("{}: {}", name, e))),
    }
}
