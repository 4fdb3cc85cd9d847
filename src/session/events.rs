//! Typed JSONL event records
//!
//! Every line in the event log is one [`Event`] wrapped in the common
//! envelope: `schema_version`, `type`, `timestamp`, `run_id`, `seed`, then
//! the variant's own fields in declaration order.

use serde::Serialize;

use super::stats::Histogram;

/// Schema tag written on every event
pub const SCHEMA_VERSION: &str = "e2e-jsonl-v1";

/// Mode tag for byte-stream (renderer-agnostic) sessions
pub const MODE_REMOTE: &str = "remote";

/// Geometry tagging shared by step, input and frame events
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeometryTag {
    pub mode: &'static str,
    pub hash_key: String,
    pub cols: u16,
    pub rows: u16,
}

impl GeometryTag {
    pub fn new(cols: u16, rows: u16, seed: u64) -> Self {
        Self {
            mode: MODE_REMOTE,
            hash_key: frame_hash_key(MODE_REMOTE, cols, rows, seed),
            cols,
            rows,
        }
    }
}

/// Key used by log validators to group frames of equal geometry and seed
pub fn frame_hash_key(mode: &str, cols: u16, rows: u16, seed: u64) -> String {
    format!("{}-{}x{}-seed{}", mode, cols, rows, seed)
}

#[derive(Debug, Clone, Serialize)]
pub struct EnvEvent {
    pub host: String,
    pub rustc: String,
    pub cargo: String,
    pub git_commit: String,
    pub git_dirty: bool,
    pub deterministic: bool,
    pub term: String,
    pub colorterm: String,
    pub no_color: String,
    pub scenario: String,
    pub initial_cols: u16,
    pub initial_rows: u16,
}

#[derive(Debug, Clone, Serialize)]
pub struct BrowserEnvEvent {
    pub browser: String,
    pub browser_version: String,
    pub user_agent: String,
    pub dpr: f64,
    pub platform: String,
    pub locale: String,
    pub timezone: String,
    pub headless: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunStartEvent {
    pub command: String,
    pub log_dir: String,
    pub results_dir: String,
    pub scenario: String,
    pub step_count: usize,
    pub timeout_s: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepStartEvent {
    pub step: String,
    #[serde(flatten)]
    pub geometry: GeometryTag,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepEndEvent {
    pub step: String,
    pub status: &'static str,
    pub duration_ms: u64,
    #[serde(flatten)]
    pub geometry: GeometryTag,
}

#[derive(Debug, Clone, Serialize)]
pub struct InputEvent {
    pub input_type: String,
    pub encoding: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes_b64: Option<String>,
    pub input_hash: String,
    pub details: String,
    #[serde(flatten)]
    pub geometry: GeometryTag,
}

#[derive(Debug, Clone, Serialize)]
pub struct FrameEvent {
    pub frame_idx: u64,
    pub hash_algo: &'static str,
    pub frame_hash: String,
    pub ts_ms: u64,
    #[serde(flatten)]
    pub geometry: GeometryTag,
    pub patch_hash: String,
    pub patch_bytes: usize,
    // Byte-stream proxies: cell/run counts are unknown at this layer.
    pub patch_cells: usize,
    pub patch_runs: usize,
    pub present_ms: f64,
    pub present_bytes: usize,
    pub checksum_chain: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorEvent {
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssertEvent {
    pub assertion: String,
    pub status: &'static str,
    pub details: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct WsMetricsEvent {
    pub label: String,
    pub ws_url: String,
    pub bytes_tx: u64,
    pub bytes_rx: u64,
    pub messages_tx: u64,
    pub messages_rx: u64,
    pub latency_histogram_ms: Histogram,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunEndEvent {
    pub status: &'static str,
    pub duration_ms: u64,
    pub failed_count: usize,
    pub outcome: &'static str,
    pub ws_in_bytes: u64,
    pub ws_out_bytes: u64,
    pub frames: u64,
    pub output_sha256: String,
    pub checksum_chain: String,
}

/// One event in the session log
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Event {
    Env(EnvEvent),
    BrowserEnv(BrowserEnvEvent),
    RunStart(RunStartEvent),
    StepStart(StepStartEvent),
    StepEnd(StepEndEvent),
    Input(InputEvent),
    Frame(FrameEvent),
    Error(ErrorEvent),
    Assert(AssertEvent),
    WsMetrics(WsMetricsEvent),
    RunEnd(RunEndEvent),
}

impl Event {
    /// Value of the `type` field
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Env(_) => "env",
            Event::BrowserEnv(_) => "browser_env",
            Event::RunStart(_) => "run_start",
            Event::StepStart(_) => "step_start",
            Event::StepEnd(_) => "step_end",
            Event::Input(_) => "input",
            Event::Frame(_) => "frame",
            Event::Error(_) => "error",
            Event::Assert(_) => "assert",
            Event::WsMetrics(_) => "ws_metrics",
            Event::RunEnd(_) => "run_end",
        }
    }
}

#[derive(Serialize)]
struct Envelope<'a> {
    schema_version: &'static str,
    #[serde(rename = "type")]
    kind: &'static str,
    timestamp: &'a str,
    run_id: &'a str,
    seed: u64,
    #[serde(flatten)]
    event: &'a Event,
}

/// Serialize an event with its envelope as one compact JSON line (no newline)
pub fn encode_line(
    event: &Event,
    timestamp: &str,
    run_id: &str,
    seed: u64,
) -> serde_json::Result<String> {
    serde_json::to_string(&Envelope {
        schema_version: SCHEMA_VERSION,
        kind: event.kind(),
        timestamp,
        run_id,
        seed,
        event,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_fields_come_first() {
        let event = Event::Error(ErrorEvent {
            message: "boom".to_string(),
        });
        let line = encode_line(&event, "T000100", "remote-00000000", 0).unwrap();
        assert_eq!(
            line,
            r#"{"schema_version":"e2e-jsonl-v1","type":"error","timestamp":"T000100","run_id":"remote-00000000","seed":0,"message":"boom"}"#
        );
    }

    #[test]
    fn test_geometry_is_flattened() {
        let event = Event::StepStart(StepStartEvent {
            step: "000:send".to_string(),
            geometry: GeometryTag::new(80, 24, 3),
        });
        let line = encode_line(&event, "T000000", "r", 3).unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["type"], "step_start");
        assert_eq!(value["mode"], "remote");
        assert_eq!(value["hash_key"], "remote-80x24-seed3");
        assert_eq!(value["cols"], 80);
        assert_eq!(value["rows"], 24);
    }

    #[test]
    fn test_resize_input_omits_payload() {
        let event = Event::Input(InputEvent {
            input_type: "resize".to_string(),
            encoding: "json",
            bytes_b64: None,
            input_hash: "sha256:00".to_string(),
            details: String::new(),
            geometry: GeometryTag::new(100, 30, 0),
        });
        let line = encode_line(&event, "T", "r", 0).unwrap();
        assert!(!line.contains("bytes_b64"));
        assert!(line.contains(r#""encoding":"json""#));
    }
}
