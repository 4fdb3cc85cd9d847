//! Configuration paths
//!
//! Uses the directories crate for platform-appropriate locations:
//! - Linux: `~/.config/term-e2e/`
//! - macOS: `~/Library/Application Support/term-e2e/`
//! - Windows: `%APPDATA%\term-e2e\`

use std::path::{Path, PathBuf};

const APP_NAME: &str = "term-e2e";

/// Get the configuration directory path
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the configuration file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

/// Directory holding the JSONL log, used for `log_dir` in `run_start`
///
/// Falls back to `E2E_LOG_DIR` when no log file is configured.
pub fn log_dir_for(jsonl: Option<&Path>) -> String {
    match jsonl {
        Some(path) => {
            let absolute = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
            absolute
                .parent()
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        }
        None => std::env::var("E2E_LOG_DIR").unwrap_or_default(),
    }
}
