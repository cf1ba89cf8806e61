//! CLI output formatting utilities.

use crate::pipeline::ProcessedVideo;
use crate::search::VideoCandidate;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    /// Print an info message.
    pub fn info(msg: &str) {
        println!("{} {}", style(">>").cyan().bold(), msg);
    }

    /// Print a success message.
    pub fn success(msg: &str) {
        println!("{} {}", style(">>").green().bold(), msg);
    }

    /// Print a warning message.
    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print an error message.
    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    /// Print a header.
    pub fn header(msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a key-value pair.
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print a list item.
    pub fn list_item(msg: &str) {
        println!("  {} {}", style("*").cyan(), msg);
    }

    /// Print a search candidate.
    pub fn video(video: &VideoCandidate) {
        let channel = video.channel.as_deref().unwrap_or("unknown channel");
        println!(
            "  {} {} ({}, {})",
            style("*").cyan(),
            style(&video.title).bold(),
            style(&video.id).dim(),
            channel
        );
        println!("    {}", style(&video.link).dim());
    }

    /// Print one pipeline result with a transcript preview or its error.
    pub fn processed(result: &ProcessedVideo, full: bool) {
        match (&result.transcript, &result.error) {
            (Some(transcript), _) => {
                println!(
                    "\n{} {} ({})",
                    style("✓").green(),
                    style(&result.video.title).bold(),
                    style(&result.video.id).dim()
                );
                let text = if full {
                    transcript.clone()
                } else {
                    content_preview(transcript, 200)
                };
                println!("   {}", text);
            }
            (None, Some(error)) => {
                println!(
                    "\n{} {} ({})",
                    style("✗").red(),
                    style(&result.video.title).bold(),
                    style(&result.video.id).dim()
                );
                println!("   {} failed: {}", error.stage, style(&error.message).dim());
            }
            (None, None) => {
                println!("\n{} {}", style("?").yellow(), style(&result.video.title).bold());
            }
        }
    }

    /// Create a spinner.
    pub fn spinner(msg: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }
}

/// Truncate content with ellipsis.
fn content_preview(content: &str, max_chars: usize) -> String {
    let content = content.replace('\n', " ");
    if content.chars().count() <= max_chars {
        content
    } else {
        let cut: String = content.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}
