//! Doctor command - verify system requirements and configuration.

use crate::cli::Output;
use crate::config::{SearchProvider, Settings};
use console::style;
use std::path::Path;
use std::process::Command;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

/// Run all diagnostic checks.
pub fn run_doctor(settings: &Settings) -> anyhow::Result<()> {
    Output::header("adbrief Doctor");
    println!();
    println!("Checking system requirements and configuration...\n");

    let mut checks = Vec::new();

    println!("{}", style("External Tools").bold());
    let tool_checks = vec![
        check_tool("yt-dlp", "yt-dlp --version", install_hint_ytdlp()),
        check_tool("ffmpeg", "ffmpeg -version", install_hint_ffmpeg()),
    ];
    for check in &tool_checks {
        check.print();
    }
    checks.extend(tool_checks);

    println!();

    println!("{}", style("API Configuration").bold());
    let api_checks = check_api_keys(settings);
    for check in &api_checks {
        check.print();
    }
    checks.extend(api_checks);

    println!();

    println!("{}", style("Directories").bold());
    let dir_checks = check_directories(settings);
    for check in &dir_checks {
        check.print();
    }
    checks.extend(dir_checks);

    println!();

    println!("{}", style("Configuration").bold());
    let config_check = check_config_file();
    config_check.print();
    checks.push(config_check);

    println!();

    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before using adbrief.",
            errors
        ));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed! adbrief is ready to use.");
    }

    Ok(())
}

/// Check if an external tool is available.
fn check_tool(name: &str, version_cmd: &str, hint: &str) -> CheckResult {
    let mut parts = version_cmd.split_whitespace();
    let Some(cmd) = parts.next() else {
        return CheckResult::error(name, "no command to run", hint);
    };

    match Command::new(cmd).args(parts).output() {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .unwrap_or("installed")
                .trim()
                .to_string();

            let version_display = if version.chars().count() > 50 {
                format!("{}...", version.chars().take(50).collect::<String>())
            } else {
                version
            };

            CheckResult::ok(name, &version_display)
        }
        Ok(_) => CheckResult::error(name, "installed but not working", hint),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            CheckResult::error(name, "not found", hint)
        }
        Err(e) => CheckResult::error(name, &format!("error: {}", e), hint),
    }
}

/// Check the API keys the configured providers need.
fn check_api_keys(settings: &Settings) -> Vec<CheckResult> {
    let mut vars = vec![settings.chat.api_key_env.as_str()];
    if settings.transcription.api_key_env != settings.chat.api_key_env {
        vars.push(settings.transcription.api_key_env.as_str());
    }

    let mut results: Vec<CheckResult> = vars
        .into_iter()
        .map(|var| check_env_key(var, std::env::var(var).ok()))
        .collect();

    if settings.search.provider == SearchProvider::YoutubeApi {
        let configured = settings.search.api_key.as_deref().is_some_and(|k| !k.is_empty());
        if configured {
            results.push(CheckResult::ok("search.api_key", "configured"));
        } else {
            results.push(check_env_key(
                "YOUTUBE_API_KEY",
                std::env::var("YOUTUBE_API_KEY").ok(),
            ));
        }
    }

    results
}

fn check_env_key(var: &str, value: Option<String>) -> CheckResult {
    let hint = format!("Set with: export {}='...'", var);
    match value {
        Some(key) if key.is_empty() => CheckResult::error(var, "empty", &hint),
        Some(key) if key.chars().count() > 12 => {
            CheckResult::ok(var, &format!("configured ({})", mask(&key)))
        }
        Some(_) => CheckResult::warning(var, "set but looks too short", "Check the key was copied completely"),
        None => CheckResult::error(var, "not set", &hint),
    }
}

/// Show only the ends of a secret.
fn mask(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    let head: String = chars.iter().take(4).collect();
    let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
    format!("{}...{}", head, tail)
}

/// Check data directories.
fn check_directories(settings: &Settings) -> Vec<CheckResult> {
    let mut results = vec![
        check_dir("Data directory", &settings.data_dir()),
        check_dir("Audio directory", &settings.audio_dir()),
    ];

    let sessions_dir = settings.sessions_dir();
    if sessions_dir.exists() {
        let count = std::fs::read_dir(&sessions_dir)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .filter(|e| e.file_name().to_string_lossy().starts_with("session_"))
                    .count()
            })
            .unwrap_or(0);
        results.push(CheckResult::ok(
            "Sessions",
            &format!("{} ({} stored)", sessions_dir.display(), count),
        ));
    } else {
        results.push(CheckResult::warning(
            "Sessions",
            &format!("{} (not created yet)", sessions_dir.display()),
            "Created when the first brief completes",
        ));
    }

    results
}

fn check_dir(name: &str, dir: &Path) -> CheckResult {
    if dir.is_dir() {
        CheckResult::ok(name, &format!("{}", dir.display()))
    } else if dir.exists() {
        CheckResult::error(
            name,
            &format!("{} is not a directory", dir.display()),
            "Remove the file or point the setting elsewhere",
        )
    } else {
        CheckResult::warning(
            name,
            &format!("{} (will be created)", dir.display()),
            "Directory will be created on first use",
        )
    }
}

/// Check if config file exists.
fn check_config_file() -> CheckResult {
    let config_path = Settings::default_config_path();
    if config_path.exists() {
        CheckResult::ok("Config file", &format!("{}", config_path.display()))
    } else {
        CheckResult::warning(
            "Config file",
            "using defaults",
            "Create with: adbrief config edit",
        )
    }
}

/// Platform-specific install hint for yt-dlp.
fn install_hint_ytdlp() -> &'static str {
    if cfg!(target_os = "macos") {
        "Install with: brew install yt-dlp"
    } else if cfg!(target_os = "linux") {
        "Install with: pip install yt-dlp (or your package manager)"
    } else {
        "Install from: https://github.com/yt-dlp/yt-dlp"
    }
}

/// Platform-specific install hint for ffmpeg.
fn install_hint_ffmpeg() -> &'static str {
    if cfg!(target_os = "macos") {
        "Install with: brew install ffmpeg"
    } else if cfg!(target_os = "linux") {
        "Install with: sudo apt install ffmpeg (or your package manager)"
    } else {
        "Install from: https://ffmpeg.org/download.html"
    }
}
