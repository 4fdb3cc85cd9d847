//! Session recording
//!
//! Hashing and latency statistics, the typed event log, and the recorder
//! that owns per-session state.

pub mod digest;
pub mod events;
pub mod recorder;
pub mod stats;

pub use digest::{hex_digest, ChecksumChain};
pub use events::Event;
pub use recorder::{Recorder, SharedRecorder, Summary, TimestampPolicy};
pub use stats::{histogram_summary, percentile, Histogram};
