//! Sessions command: inspect stored session records.

use crate::cli::{Output, SessionsAction};
use crate::config::Settings;
use crate::session::{SessionRecord, SessionStatus};
use crate::store::{JsonFileStore, SessionStore};
use anyhow::{anyhow, Result};

/// Run the sessions command.
pub async fn run_sessions(action: &SessionsAction, settings: Settings) -> Result<()> {
    let store = JsonFileStore::new(settings.sessions_dir());

    match action {
        SessionsAction::List => {
            let ids = store.list_keys().await?;
            if ids.is_empty() {
                Output::info("No sessions stored yet.");
                Output::info("Start one with: adbrief chat");
                return Ok(());
            }

            Output::header(&format!("Sessions ({})", ids.len()));
            println!();
            for id in &ids {
                match store.get(id).await {
                    Ok(Some(record)) => Output::list_item(&summary(&record)),
                    Ok(None) => {}
                    Err(e) => Output::list_item(&format!("{} (unreadable: {})", id, e)),
                }
            }
        }

        SessionsAction::Show { session_id } => {
            let record = load(&store, session_id).await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }

        SessionsAction::Results { session_id, full } => {
            let record = load(&store, session_id).await?;

            Output::header(&format!("Session {}", record.session_id));
            Output::kv("Status", &record.status.to_string());
            if let Some(query) = &record.query {
                Output::kv("Query", query);
            }
            if let Some(error) = &record.error {
                Output::kv("Error", error);
            }

            match &record.processed_results {
                Some(results) => {
                    for result in results {
                        Output::processed(result, *full);
                    }
                    println!();
                }
                None if record.status == SessionStatus::Completed => {
                    Output::warning("Processing has not finished for this session.");
                }
                None => Output::info("This session has no results."),
            }
        }
    }

    Ok(())
}

async fn load(store: &JsonFileStore, session_id: &str) -> Result<SessionRecord> {
    store
        .get(session_id)
        .await?
        .ok_or_else(|| anyhow!("Session not found: {}", session_id))
}

/// One-line description of a record.
fn summary(record: &SessionRecord) -> String {
    let query = record.query.as_deref().unwrap_or("-");
    let progress = match &record.processed_results {
        Some(results) => format!(
            "{}/{} transcribed",
            results.len() - record.failed_items(),
            results.len()
        ),
        None if record.is_processing() => "processing".to_string(),
        None => "no results".to_string(),
    };
    format!(
        "{} [{}] {} ({})",
        record.session_id, record.status, query, progress
    )
}
