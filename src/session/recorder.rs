//! Session recorder
//!
//! Owns all mutable session state (counters, geometry, received chunks,
//! frame timing and the checksum chain) and writes every event to the JSONL
//! sink as soon as it is emitted. One recorder belongs to exactly one
//! session; the reader and driver tasks share it through [`SharedRecorder`].

use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::common::{EngineConfig, Error, Result};

use super::digest::{hex_digest, tagged, ChecksumChain};
use super::events::{encode_line, Event, FrameEvent, GeometryTag};
use super::stats::{histogram_summary, Histogram};

/// Recorder handle shared between the reader and driver tasks
///
/// Each mutation takes the lock once and finishes without awaiting, so a
/// chunk's chain update and its frame event are never interleaved with
/// another mutation.
pub type SharedRecorder = Arc<Mutex<Recorder>>;

/// Destination for serialized event lines
pub type EventSink = Box<dyn Write + Send>;

/// How event timestamps are produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampPolicy {
    /// `T{index * step_ms:06}`, byte-identical across runs
    Deterministic { step_ms: u64 },
    /// Local ISO-8601 time with UTC offset
    WallClock,
}

impl TimestampPolicy {
    pub fn from_config(config: &EngineConfig) -> Self {
        if config.deterministic {
            Self::Deterministic {
                step_ms: config.time_step_ms,
            }
        } else {
            Self::WallClock
        }
    }

    /// Timestamp for the event at `event_idx`
    pub fn render(&self, event_idx: u64) -> String {
        match self {
            Self::Deterministic { step_ms } => format!("T{:06}", event_idx * step_ms),
            Self::WallClock => chrono::Local::now()
                .format("%Y-%m-%dT%H:%M:%S%z")
                .to_string(),
        }
    }
}

/// Immutable end-of-session snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub scenario: String,
    pub ws_in_bytes: u64,
    pub ws_out_bytes: u64,
    pub messages_tx: u64,
    pub messages_rx: u64,
    pub frames: u64,
    pub output_sha256: String,
    pub checksum_chain: String,
    pub frame_gap_histogram_ms: Histogram,
}

/// Mutable per-session state
#[derive(Debug)]
struct SessionState {
    start: Instant,
    last_frame: Instant,
    cols: u16,
    rows: u16,
    event_idx: u64,
    bytes_sent: u64,
    bytes_received: u64,
    messages_sent: u64,
    messages_received: u64,
    output_chunks: Vec<Vec<u8>>,
    frame_gaps_ms: Vec<f64>,
    frame_idx: u64,
    chain: ChecksumChain,
}

impl SessionState {
    fn new(cols: u16, rows: u16) -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_frame: now,
            cols,
            rows,
            event_idx: 0,
            bytes_sent: 0,
            bytes_received: 0,
            messages_sent: 0,
            messages_received: 0,
            output_chunks: Vec::new(),
            frame_gaps_ms: Vec::new(),
            frame_idx: 0,
            chain: ChecksumChain::new(),
        }
    }
}

/// Records session events and maintains the rolling checksum
pub struct Recorder {
    run_id: String,
    seed: u64,
    scenario: String,
    timestamps: TimestampPolicy,
    sink: Option<EventSink>,
    lines: Vec<String>,
    state: SessionState,
}

impl Recorder {
    /// Create a recorder without a log sink
    pub fn new(config: &EngineConfig, run_id: &str, scenario: &str, cols: u16, rows: u16) -> Self {
        Self {
            run_id: run_id.to_string(),
            seed: config.seed,
            scenario: scenario.to_string(),
            timestamps: TimestampPolicy::from_config(config),
            sink: None,
            lines: Vec::new(),
            state: SessionState::new(cols, rows),
        }
    }

    /// Attach a log sink; every later event is written and flushed to it
    pub fn with_sink(mut self, sink: EventSink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Open (append) a JSONL file as an event sink
    pub fn open_jsonl(path: &Path) -> Result<EventSink> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| Error::file_read(path, e))?;
        Ok(Box::new(BufWriter::new(file)))
    }

    /// Wrap the recorder for sharing between tasks
    pub fn into_shared(self) -> SharedRecorder {
        Arc::new(Mutex::new(self))
    }

    /// Current (cols, rows)
    pub fn geometry(&self) -> (u16, u16) {
        (self.state.cols, self.state.rows)
    }

    /// Geometry tagging for the current geometry
    pub fn geometry_tag(&self) -> GeometryTag {
        GeometryTag::new(self.state.cols, self.state.rows, self.seed)
    }

    /// Number of frames recorded so far
    pub fn frames(&self) -> u64 {
        self.state.frame_idx
    }

    /// Every emitted event line, in emission order
    pub fn events(&self) -> &[String] {
        &self.lines
    }

    /// Append an event to the log and flush it to the sink
    pub fn emit(&mut self, event: Event) -> Result<()> {
        let timestamp = self.timestamps.render(self.state.event_idx);
        let line = encode_line(&event, &timestamp, &self.run_id, self.seed)?;

        if let Some(sink) = self.sink.as_mut() {
            sink.write_all(line.as_bytes())?;
            sink.write_all(b"\n")?;
            sink.flush()?;
        }

        tracing::trace!(kind = event.kind(), idx = self.state.event_idx, "event emitted");
        self.lines.push(line);
        self.state.event_idx += 1;
        Ok(())
    }

    /// Record one inbound output message
    pub fn record_output(&mut self, data: &[u8]) -> Result<()> {
        let now = Instant::now();
        let gap_ms = now.duration_since(self.state.last_frame).as_secs_f64() * 1000.0;
        self.state.last_frame = now;
        // The first frame has no predecessor, so it contributes no gap sample.
        if self.state.frame_idx > 0 {
            self.state.frame_gaps_ms.push(gap_ms);
        }

        self.state.output_chunks.push(data.to_vec());
        self.state.bytes_received += data.len() as u64;
        let chunk_hash = self.state.chain.extend(data);
        self.state.frame_idx += 1;

        let ts_ms = now.duration_since(self.state.start).as_millis() as u64;
        let frame = FrameEvent {
            frame_idx: self.state.frame_idx,
            hash_algo: "sha256",
            frame_hash: tagged(&chunk_hash),
            ts_ms,
            geometry: self.geometry_tag(),
            patch_hash: tagged(&chunk_hash),
            patch_bytes: data.len(),
            patch_cells: data.len(),
            patch_runs: 1,
            present_ms: (gap_ms * 1000.0).round() / 1000.0,
            present_bytes: data.len(),
            checksum_chain: tagged(self.state.chain.value()),
        };
        tracing::trace!(frame = self.state.frame_idx, bytes = data.len(), "frame recorded");
        self.emit(Event::Frame(frame))
    }

    /// Count an outbound message; the checksum chain covers received data only
    pub fn record_send(&mut self, data: &[u8]) {
        self.state.bytes_sent += data.len() as u64;
        self.state.messages_sent += 1;
    }

    /// Count an inbound message regardless of its size
    pub fn record_receive(&mut self) {
        self.state.messages_received += 1;
    }

    /// Update geometry used to tag later events
    pub fn set_geometry(&mut self, cols: u16, rows: u16) {
        self.state.cols = cols;
        self.state.rows = rows;
    }

    /// Concatenation of every received chunk
    pub fn full_output(&self) -> Vec<u8> {
        self.state.output_chunks.concat()
    }

    /// Current checksum chain value (hex, no prefix)
    pub fn final_checksum(&self) -> &str {
        self.state.chain.value()
    }

    /// Snapshot of the session; repeated calls agree until the next mutation
    pub fn summary(&self) -> Summary {
        Summary {
            scenario: self.scenario.clone(),
            ws_in_bytes: self.state.bytes_sent,
            ws_out_bytes: self.state.bytes_received,
            messages_tx: self.state.messages_sent,
            messages_rx: self.state.messages_received,
            frames: self.state.frame_idx,
            output_sha256: tagged(&hex_digest(&self.full_output())),
            checksum_chain: tagged(self.state.chain.value()),
            frame_gap_histogram_ms: histogram_summary(&self.state.frame_gaps_ms),
        }
    }

    /// Flush and release the log sink; safe to call more than once
    pub fn close(&mut self) -> Result<()> {
        if let Some(mut sink) = self.sink.take() {
            sink.flush()?;
        }
        Ok(())
    }
}
