//! CLI command definitions
//!
//! Defines the clap commands for the e2e driver.

use clap::Subcommand;
use std::path::PathBuf;

/// Default bridge endpoint
pub const DEFAULT_URL: &str = "ws://127.0.0.1:9231";

#[derive(Subcommand)]
pub enum Commands {
    /// Run a scenario against a bridge
    Run {
        /// Bridge WebSocket URL
        #[arg(long, default_value = DEFAULT_URL)]
        url: String,

        /// Scenario file (JSON, or YAML by extension)
        #[arg(long)]
        scenario: PathBuf,

        /// Golden baseline to compare the checksum chain against
        #[arg(long)]
        golden: Option<PathBuf>,

        /// Write the golden baseline from this run instead of comparing
        #[arg(long, requires = "golden")]
        update_golden: bool,

        /// Append JSONL events to this file
        #[arg(long)]
        jsonl: Option<PathBuf>,

        /// Write the concatenated received bytes to this file
        #[arg(long)]
        transcript: Option<PathBuf>,

        /// Print the result JSON even when a JSONL log is written
        #[arg(long)]
        summary: bool,

        /// Engine configuration file (TOML)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Write diagnostics to this file as well as stderr
        #[arg(long)]
        log_file: Option<PathBuf>,
    },

    /// Parse a scenario and decode its payloads without connecting
    Validate {
        /// Scenario file to check
        scenario: PathBuf,
    },
}

impl Commands {
    /// Diagnostics file requested by the command, if any
    pub fn log_file(&self) -> Option<&std::path::Path> {
        match self {
            Commands::Run { log_file, .. } => log_file.as_deref(),
            Commands::Validate { .. } => None,
        }
    }
}
