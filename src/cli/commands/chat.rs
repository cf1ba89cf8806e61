//! Interactive brief conversation in the terminal.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::session::SessionController;
use anyhow::Result;
use console::style;
use std::io::{self, BufRead, Write};

/// Run the interactive chat command.
pub async fn run_chat(settings: Settings) -> Result<()> {
    // Pre-flight checks
    if let Err(e) = preflight::check(Operation::Converse, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'adbrief doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let controller = SessionController::from_settings(&settings)?;
    let start = controller.start_session().await;
    let session_id = start.session_id;

    println!("\n{}", style("adbrief").bold().cyan());
    println!("{}\n", style("Describe your ad, or type 'exit' to quit.").dim());
    println!("{} {}\n", style("Assistant:").cyan().bold(), start.message);

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut completed = false;

    loop {
        print!("{} ", style("You:").green().bold());
        stdout.flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            break;
        }

        let input = input.trim();

        if input.is_empty() {
            continue;
        }

        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            Output::info("Goodbye!");
            return Ok(());
        }

        let response = match controller.post_message(&session_id, input).await {
            Ok(response) => response,
            Err(e) if e.is_retryable() => {
                Output::warning(&format!("{} (send the message again to retry)", e));
                continue;
            }
            Err(e) => {
                Output::error(&format!("Error: {}", e));
                return Err(e.into());
            }
        };

        if !response.is_complete {
            println!("\n{} {}\n", style("Assistant:").cyan().bold(), response.message);
            continue;
        }

        let videos = response.youtube_results.unwrap_or_default();
        Output::success(&format!("Brief complete. Found {} reference videos:", videos.len()));
        for video in &videos {
            Output::video(video);
        }
        completed = true;
        break;
    }

    if !completed {
        return Ok(());
    }

    let spinner = Output::spinner("Downloading and transcribing videos...");
    controller.wait_for_processing(&session_id).await;
    spinner.finish_and_clear();

    let record = controller.get_session(&session_id).await?;
    if let Some(error) = &record.error {
        Output::error(&format!("Processing failed: {}", error));
    }
    if let Some(results) = &record.processed_results {
        Output::header("Transcripts");
        for result in results {
            Output::processed(result, false);
        }
        println!();
        Output::success(&format!(
            "{} of {} videos transcribed.",
            results.len() - record.failed_items(),
            results.len()
        ));
    }
    if let Some(persistence_error) = &record.persistence_error {
        Output::warning(&format!("Session was not saved: {}", persistence_error));
    } else {
        Output::kv("Session", &session_id);
    }

    Ok(())
}
