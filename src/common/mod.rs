//! Common utilities shared by the CLI, the recorder and the session runner

pub mod config;
pub mod error;
pub mod logging;
pub mod paths;
pub mod probe;

pub use config::EngineConfig;
pub use error::{Error, Result};
