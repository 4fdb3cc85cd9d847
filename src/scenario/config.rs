//! Scenario and golden baseline documents
//!
//! Scenarios are JSON (or YAML, by extension) documents describing the
//! initial geometry and an ordered list of timed steps.

use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::common::{Error, Result};
use crate::session::Summary;

/// A complete scenario loaded from disk
#[derive(Deserialize, Debug, Clone)]
pub struct Scenario {
    /// Name of the scenario, used as the run label
    pub name: String,
    /// Optional description of what the scenario exercises
    #[serde(default)]
    pub description: Option<String>,
    /// Terminal columns before the first resize
    #[serde(default = "default_cols")]
    pub initial_cols: u16,
    /// Terminal rows before the first resize
    #[serde(default = "default_rows")]
    pub initial_rows: u16,
    /// Overall budget in seconds; reported, enforced by the caller
    #[serde(default = "default_timeout")]
    pub timeout_s: u64,
    /// The sequence of steps to execute
    #[serde(default)]
    pub steps: Vec<Step>,
}

fn default_cols() -> u16 {
    120
}
fn default_rows() -> u16 {
    40
}
fn default_timeout() -> u64 {
    30
}

/// One scripted step: an action plus its pre-delay and annotation
#[derive(Deserialize, Debug, Clone)]
pub struct Step {
    #[serde(flatten)]
    pub action: StepAction,
    /// Delay applied before the action
    #[serde(default)]
    pub delay_ms: u64,
    /// Free-form annotation copied into `input` events
    #[serde(default)]
    pub comment: Option<String>,
}

/// What a step does
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepAction {
    /// Send terminal input
    Send {
        /// Payload as hex (checked first)
        #[serde(default)]
        data_hex: Option<String>,
        /// Payload as base64 (checked second)
        #[serde(default)]
        data_b64: Option<String>,
        /// Payload as literal text (checked last)
        #[serde(default)]
        data: Option<String>,
        /// Label for the `input` event
        #[serde(default = "default_input_type")]
        input_type: String,
    },
    /// Resize the remote terminal
    Resize { cols: u16, rows: u16 },
    /// Sleep without touching the connection
    Wait {
        #[serde(rename = "ms", alias = "duration_ms", default = "default_wait")]
        duration_ms: u64,
    },
    /// Sleep for the configured settle interval
    Drain,
}

fn default_input_type() -> String {
    "keys".to_string()
}
fn default_wait() -> u64 {
    100
}

impl StepAction {
    /// Step type name as written in scenarios and logs
    pub fn kind(&self) -> &'static str {
        match self {
            StepAction::Send { .. } => "send",
            StepAction::Resize { .. } => "resize",
            StepAction::Wait { .. } => "wait",
            StepAction::Drain => "drain",
        }
    }
}

/// Decode a send payload: hex, then base64, then literal text; empty if none
pub fn decode_payload(
    step: usize,
    data_hex: Option<&str>,
    data_b64: Option<&str>,
    data: Option<&str>,
) -> Result<Vec<u8>> {
    if let Some(hex_str) = data_hex {
        let compact: String = hex_str
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        return hex::decode(compact).map_err(|e| Error::decode(step, "hex", e));
    }
    if let Some(b64) = data_b64 {
        return base64::engine::general_purpose::STANDARD
            .decode(b64.trim())
            .map_err(|e| Error::decode(step, "base64", e));
    }
    if let Some(text) = data {
        return Ok(text.as_bytes().to_vec());
    }
    Ok(Vec::new())
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

impl Scenario {
    /// Load a scenario from a JSON or YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::file_read(path, e))?;
        let parsed = if is_yaml(path) {
            serde_yaml::from_str(&content).map_err(|e| {
                Error::Config(format!("Failed to parse scenario '{}': {}", path.display(), e))
            })?
        } else {
            serde_json::from_str(&content).map_err(|e| {
                Error::Config(format!("Failed to parse scenario '{}': {}", path.display(), e))
            })?
        };
        Ok(parsed)
    }

    /// Decode every send payload without connecting
    pub fn validate(&self) -> Result<()> {
        for (i, step) in self.steps.iter().enumerate() {
            if let StepAction::Send {
                data_hex,
                data_b64,
                data,
                ..
            } = &step.action
            {
                decode_payload(i, data_hex.as_deref(), data_b64.as_deref(), data.as_deref())?;
            }
        }
        Ok(())
    }
}

/// Golden baseline produced by a previous accepted run
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct GoldenBaseline {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario: Option<String>,
    /// Expected final chain, `sha256:<hex>`; empty disables the comparison
    #[serde(default)]
    pub checksum_chain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frames: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_sha256: Option<String>,
}

impl GoldenBaseline {
    /// Load a baseline; `Ok(None)` when the file does not exist
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path).map_err(|e| Error::file_read(path, e))?;
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| Error::GoldenParse {
                path: path.display().to_string(),
                error: e.to_string(),
            })
    }

    /// Baseline capturing an accepted summary
    pub fn from_summary(summary: &Summary) -> Self {
        Self {
            scenario: Some(summary.scenario.clone()),
            checksum_chain: summary.checksum_chain.clone(),
            frames: Some(summary.frames as i64),
            output_sha256: Some(summary.output_sha256.clone()),
        }
    }

    /// Write the baseline as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json + "\n")?;
        Ok(())
    }
}
