//! Best-effort host introspection for the `env` and `browser_env` events
//!
//! Every probe falls back to `"unknown"` (or `false`) instead of failing the
//! run; the values are informational only.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const UNKNOWN: &str = "unknown";

/// Run a command and return its trimmed stdout when it exits successfully
async fn capture(program: &str, args: &[&str]) -> Option<String> {
    let path = which::which(program).ok()?;
    let output = tokio::time::timeout(
        PROBE_TIMEOUT,
        Command::new(path)
            .args(args)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output(),
    )
    .await
    .ok()?
    .ok()?;

    if !output.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// First line of `<command> --version`, or "unknown"
pub async fn command_version(command: &str) -> String {
    capture(command, &["--version"])
        .await
        .and_then(|out| out.lines().next().map(str::to_string))
        .filter(|line| !line.is_empty())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// Short SHA of the working tree HEAD
pub async fn git_sha() -> String {
    capture("git", &["rev-parse", "--short", "HEAD"])
        .await
        .filter(|sha| !sha.is_empty())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// Whether the working tree has uncommitted changes
pub async fn git_dirty() -> bool {
    capture("git", &["status", "--porcelain"])
        .await
        .map(|out| !out.is_empty())
        .unwrap_or(false)
}

/// Host name, falling back to the OS description
pub fn host_name() -> String {
    if let Ok(name) = std::env::var("HOSTNAME") {
        if !name.trim().is_empty() {
            return name.trim().to_string();
        }
    }
    if let Ok(name) = std::fs::read_to_string("/etc/hostname") {
        if !name.trim().is_empty() {
            return name.trim().to_string();
        }
    }
    platform()
}

/// Operating system name (e.g. "Ubuntu", "Mac OS", "Windows")
pub fn platform() -> String {
    os_info::get().os_type().to_string()
}

/// Environment variable or empty string
pub fn env_or_empty(key: &str) -> String {
    std::env::var(key).unwrap_or_default()
}
