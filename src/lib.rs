//! adbrief - Ad Brief Conversations and Reference Video Transcription
//!
//! Talks a user through an advertising brief, turns the finished brief into a
//! video search query and transcribes the matching videos in the background.
//!
//! # Overview
//!
//! adbrief allows you to:
//! - Hold a multi-turn conversation with a chat model until the brief is complete
//! - Search for reference videos matching the brief
//! - Download, transcribe and store the audio of every video concurrently
//! - Poll session records for the results over HTTP or the CLI
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration management
//! - `conversation` - Brief conversation state machine and chat client
//! - `search` - Video search providers
//! - `audio` - Audio download
//! - `transcription` - Speech-to-text transcription
//! - `pipeline` - Per-video processing and concurrent fan-out
//! - `store` - Durable session storage
//! - `session` - Session lifecycle controller
//!
//! # Example
//!
//! ```rust,no_run
//! use adbrief::config::Settings;
//! use adbrief::session::SessionController;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let controller = SessionController::from_settings(&settings)?;
//!
//!     let start = controller.start_session().await;
//!     println!("{}", start.message);
//!
//!     let reply = controller
//!         .post_message(&start.session_id, "An ad for running shoes aimed at college athletes")
//!         .await?;
//!     println!("{}", reply.message);
//!
//!     controller.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod audio;
pub mod cli;
pub mod config;
pub mod conversation;
pub mod error;
pub mod openai;
pub mod pipeline;
pub mod search;
pub mod session;
pub mod store;
pub mod transcription;

#[cfg(test)]
mod testing;

pub use error::{AdbriefError, Result};
