//! `adbrief config show|edit|path`.

use crate::cli::{ConfigAction, Output};
use crate::config::Settings;
use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

pub fn run_config(action: &ConfigAction, settings: Settings, config_path: Option<PathBuf>) -> Result<()> {
    let path = config_path.unwrap_or_else(Settings::default_config_path);

    match action {
        ConfigAction::Show => print!("{}", render(&settings, &path)?),
        ConfigAction::Path => println!("{}", path.display()),
        ConfigAction::Edit => {
            if write_if_missing(&settings, &path)? {
                Output::info(&format!("Wrote effective settings to {}", path.display()));
            }
            let editor = editor(std::env::var("VISUAL").ok(), std::env::var("EDITOR").ok());
            let status = Command::new(&editor)
                .arg(&path)
                .status()
                .with_context(|| format!("could not launch '{}'; edit {} by hand", editor, path.display()))?;
            if !status.success() {
                bail!("'{}' exited with {}", editor, status);
            }
            Settings::load_from(Some(&path)).context("edited config no longer parses")?;
            Output::success("Config is valid.");
        }
    }

    Ok(())
}

/// Effective settings as TOML, headed by the file they would be saved to.
fn render(settings: &Settings, path: &Path) -> Result<String> {
    let body = toml::to_string_pretty(settings).context("failed to serialize settings")?;
    Ok(format!("# {}\n{}", path.display(), body))
}

/// Save `settings` to `path` unless a file is already there.
fn write_if_missing(settings: &Settings, path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    settings.save_to(&path.to_path_buf())?;
    Ok(true)
}

fn editor(visual: Option<String>, editor: Option<String>) -> String {
    visual
        .into_iter()
        .chain(editor)
        .find(|e| !e.trim().is_empty())
        .unwrap_or_else(|| "vi".to_string())
}
