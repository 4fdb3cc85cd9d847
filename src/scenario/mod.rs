//! Scenario execution
//!
//! Scenario and golden documents, the per-step interpreter, and the session
//! runner that drives one scripted connection end to end.

pub mod config;
pub mod interpreter;
pub mod runner;

pub use config::{GoldenBaseline, Scenario, Step, StepAction};
pub use interpreter::StepInterpreter;
pub use runner::{run_session, Outcome, SessionOptions, SessionPhase, SessionResult};
