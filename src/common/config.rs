//! Engine configuration
//!
//! Built once at startup from defaults, an optional TOML file and a few
//! `E2E_*` environment overrides, then passed by reference to the recorder
//! and the session runner.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use super::paths::config_path;
use super::{Error, Result};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Seed stamped on every event and used for deterministic run ids
    #[serde(default)]
    pub seed: u64,

    /// Use synthetic timestamps so identical runs produce identical logs
    #[serde(default = "default_deterministic")]
    pub deterministic: bool,

    /// Milliseconds between synthetic timestamps
    #[serde(default = "default_time_step")]
    pub time_step_ms: u64,

    /// Connection settings
    #[serde(default)]
    pub transport: TransportConfig,

    /// Settle intervals
    #[serde(default)]
    pub settle: SettleConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            deterministic: default_deterministic(),
            time_step_ms: default_time_step(),
            transport: TransportConfig::default(),
            settle: SettleConfig::default(),
        }
    }
}

fn default_deterministic() -> bool {
    true
}
fn default_time_step() -> u64 {
    100
}

/// WebSocket connection settings
#[derive(Debug, Clone, Deserialize)]
pub struct TransportConfig {
    /// Timeout for the opening handshake
    #[serde(default = "default_open_timeout")]
    pub open_timeout_secs: u64,

    /// Timeout for the closing handshake
    #[serde(default = "default_close_timeout")]
    pub close_timeout_secs: u64,

    /// Largest inbound frame/message accepted
    #[serde(default = "default_max_frame")]
    pub max_frame_bytes: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            open_timeout_secs: default_open_timeout(),
            close_timeout_secs: default_close_timeout(),
            max_frame_bytes: default_max_frame(),
        }
    }
}

impl TransportConfig {
    pub fn open_timeout(&self) -> Duration {
        Duration::from_secs(self.open_timeout_secs)
    }

    pub fn close_timeout(&self) -> Duration {
        Duration::from_secs(self.close_timeout_secs)
    }
}

fn default_open_timeout() -> u64 {
    10
}
fn default_close_timeout() -> u64 {
    5
}
fn default_max_frame() -> usize {
    256 * 1024
}

/// Settle intervals in milliseconds
#[derive(Debug, Clone, Deserialize)]
pub struct SettleConfig {
    /// Sleep performed by a `drain` step
    #[serde(default = "default_drain")]
    pub drain_ms: u64,

    /// Sleep after the last step before the reader is cancelled
    #[serde(default = "default_final")]
    pub final_ms: u64,
}

impl Default for SettleConfig {
    fn default() -> Self {
        Self {
            drain_ms: default_drain(),
            final_ms: default_final(),
        }
    }
}

fn default_drain() -> u64 {
    500
}
fn default_final() -> u64 {
    300
}

impl EngineConfig {
    /// Load configuration from an explicit path or the default config file,
    /// then apply `E2E_*` environment overrides
    ///
    /// Returns default configuration if no file exists
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        config.apply_env_with(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Parse a TOML configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::file_read(path, e))?;
        toml::from_str(&content).map_err(|e| Error::ConfigParse(e.to_string()))
    }

    /// Apply `E2E_SEED`, `E2E_DETERMINISTIC` and `E2E_TIME_STEP_MS`
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(seed) = lookup("E2E_SEED") {
            self.seed = seed
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("Invalid E2E_SEED: {}", seed)))?;
        }
        if let Some(flag) = lookup("E2E_DETERMINISTIC") {
            self.deterministic = flag.trim() == "1";
        }
        if let Some(step) = lookup("E2E_TIME_STEP_MS") {
            self.time_step_ms = step
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("Invalid E2E_TIME_STEP_MS: {}", step)))?;
        }
        Ok(())
    }

    /// Run identifier derived from the seed (deterministic) or the wall clock
    pub fn run_id(&self) -> String {
        if self.deterministic {
            format!("remote-{:08x}", self.seed)
        } else {
            format!("remote-{:x}", chrono::Utc::now().timestamp_millis())
        }
    }
}
