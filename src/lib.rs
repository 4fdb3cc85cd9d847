//! Remote terminal end-to-end driver
//!
//! Drives a remote terminal bridge over WebSocket with a scripted scenario,
//! records every observable event to a JSONL log, and reduces the received
//! byte stream to a rolling checksum chain that can be compared against a
//! golden baseline.

pub mod cli;
pub mod commands;
pub mod common;
pub mod scenario;
pub mod session;
pub mod transport;

// Re-export commonly used types for tests
pub use common::{EngineConfig, Error, Result};
pub use scenario::{run_session, Scenario, SessionOptions, SessionResult};
pub use session::{Recorder, SharedRecorder};
