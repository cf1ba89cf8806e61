//! Process command: search and transcribe without a conversation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::pipeline::PipelineOrchestrator;
use crate::search::create_search;
use anyhow::Result;

/// Run the process command.
pub async fn run_process(query: &str, limit: Option<usize>, mut settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Process, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'adbrief doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    if let Some(limit) = limit {
        settings.search.max_results = limit;
    }

    let search = create_search(&settings)?;
    let orchestrator = PipelineOrchestrator::new(&settings)?;

    let spinner = Output::spinner(&format!("Searching for \"{}\"...", query));
    let candidates = search.search(query).await;
    spinner.finish_and_clear();
    let candidates = candidates?;

    if candidates.is_empty() {
        Output::warning("No videos found.");
        return Ok(());
    }

    Output::info(&format!("Found {} videos:", candidates.len()));
    for video in &candidates {
        Output::video(video);
    }

    let spinner = Output::spinner("Downloading and transcribing...");
    let results = orchestrator.process_all(candidates).await;
    spinner.finish_and_clear();
    let results = results?;

    Output::header("Transcripts");
    for result in &results {
        Output::processed(result, false);
    }
    println!();

    let failed = results.iter().filter(|r| !r.is_ok()).count();
    if failed == 0 {
        Output::success(&format!("All {} videos transcribed.", results.len()));
    } else {
        Output::warning(&format!("{} of {} videos failed.", failed, results.len()));
    }
    Output::kv("Transcripts", &settings.transcripts_dir().display().to_string());

    Ok(())
}
