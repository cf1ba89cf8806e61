//! CLI module for adbrief.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// adbrief - ad brief conversations and reference video transcription
///
/// Talks a user through an advertising brief, searches for reference videos
/// matching it and transcribes them in the background.
#[derive(Parser, Debug)]
#[command(name = "adbrief")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "ADBRIEF_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Host to bind to (defaults to server.host)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (defaults to server.port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Work out an ad brief interactively in the terminal
    Chat,

    /// Search for videos and transcribe them without a conversation
    Process {
        /// Search query
        query: String,

        /// Maximum number of videos (defaults to search.max_results)
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Inspect stored sessions
    Sessions {
        #[command(subcommand)]
        action: SessionsAction,
    },

    /// Check system requirements and configuration
    Doctor,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum SessionsAction {
    /// List stored sessions
    List,

    /// Show a session record as JSON
    Show {
        /// Session ID
        session_id: String,
    },

    /// Show the processed videos of a session
    Results {
        /// Session ID
        session_id: String,

        /// Print full transcripts instead of a preview
        #[arg(long)]
        full: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_process() {
        let cli = Cli::try_parse_from(["adbrief", "-vv", "process", "running shoes", "--limit", "3"]).unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Process { query, limit } => {
                assert_eq!(query, "running shoes");
                assert_eq!(limit, Some(3));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_sessions_results() {
        let cli = Cli::try_parse_from(["adbrief", "sessions", "results", "20250101_000000_000000", "--full"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Sessions {
                action: SessionsAction::Results { full: true, .. }
            }
        ));
    }

    #[test]
    fn test_serve_defaults_come_from_settings() {
        let cli = Cli::try_parse_from(["adbrief", "serve"]).unwrap();
        assert!(matches!(cli.command, Commands::Serve { host: None, port: None }));
    }
}
