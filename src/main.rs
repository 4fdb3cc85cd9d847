//! term-e2e - scripted end-to-end checks for remote terminal bridges
//!
//! Connects to a bridge over WebSocket, replays a scenario, and reports a
//! pass/fail verdict backed by a deterministic checksum chain.

use clap::Parser;
use commands::Commands;
use term_e2e::{cli, commands, common::logging};

#[derive(Parser)]
#[command(name = "term-e2e", about = "Remote terminal end-to-end driver")]
#[command(version, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let guard = logging::init_cli(cli.command.log_file());

    let code = match cli::dispatch(cli.command).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            1
        }
    };

    // process::exit skips destructors; flush the log file writer first.
    drop(guard);
    std::process::exit(code);
}
