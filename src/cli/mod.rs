//! CLI command handling
//!
//! Loads configuration and the scenario, runs the session, and reports the
//! result: JSON on stdout, a short colored verdict on stderr.

use std::path::{Path, PathBuf};

use colored::Colorize;

use crate::commands::Commands;
use crate::common::{paths, EngineConfig, Result};
use crate::scenario::{run_session, GoldenBaseline, Scenario, SessionOptions, SessionResult};
use crate::session::Recorder;

/// Dispatch a CLI command, returning the process exit code
pub async fn dispatch(command: Commands) -> Result<i32> {
    match command {
        Commands::Run {
            url,
            scenario,
            golden,
            update_golden,
            jsonl,
            transcript,
            summary,
            config,
            log_file: _,
        } => {
            let config = EngineConfig::load(config.as_deref())?;
            let request = RunRequest {
                url,
                scenario,
                golden,
                update_golden,
                jsonl,
                transcript,
                print_summary: summary,
            };
            let result = run(&config, &request).await?;
            print_verdict(&result);
            Ok(result.exit_code())
        }

        Commands::Validate { scenario } => {
            let loaded = Scenario::load(&scenario)?;
            loaded.validate()?;
            println!(
                "{} {} ({} steps)",
                "✓".green(),
                loaded.name,
                loaded.steps.len()
            );
            Ok(0)
        }
    }
}

/// Arguments of one `run` invocation
struct RunRequest {
    url: String,
    scenario: PathBuf,
    golden: Option<PathBuf>,
    update_golden: bool,
    jsonl: Option<PathBuf>,
    transcript: Option<PathBuf>,
    print_summary: bool,
}

async fn run(config: &EngineConfig, request: &RunRequest) -> Result<SessionResult> {
    let scenario = Scenario::load(&request.scenario)?;
    let run_id = config.run_id();
    tracing::info!(scenario = %scenario.name, %run_id, url = %request.url, "starting run");

    let mut recorder = Recorder::new(
        config,
        &run_id,
        &scenario.name,
        scenario.initial_cols,
        scenario.initial_rows,
    );
    if let Some(path) = &request.jsonl {
        recorder = recorder.with_sink(Recorder::open_jsonl(path)?);
    }
    let recorder = recorder.into_shared();

    let log_dir = paths::log_dir_for(request.jsonl.as_deref());
    let results_dir = std::env::var("E2E_RESULTS_DIR").unwrap_or_else(|_| log_dir.clone());
    let options = SessionOptions {
        url: &request.url,
        // Updating replaces the baseline, so there is nothing to compare.
        golden: if request.update_golden {
            None
        } else {
            request.golden.as_deref()
        },
        command: format!(
            "term-e2e run --url {} --scenario {}",
            request.url,
            request.scenario.display()
        ),
        log_dir,
        results_dir,
    };

    let result = run_session(config, &scenario, recorder.clone(), &options).await?;

    {
        let mut rec = recorder.lock().await;
        rec.close()?;
        if let Some(path) = &request.transcript {
            write_transcript(path, &rec.full_output())?;
        }
    }

    if request.update_golden {
        if let Some(path) = &request.golden {
            if result.passed() {
                GoldenBaseline::from_summary(&result.summary).save(path)?;
                tracing::info!(path = %path.display(), "golden baseline updated");
            } else {
                tracing::warn!(
                    path = %path.display(),
                    "run failed, golden baseline left unchanged"
                );
            }
        }
    }

    if request.print_summary || request.jsonl.is_none() {
        println!("{}", serde_json::to_string_pretty(&result)?);
    }

    Ok(result)
}

fn write_transcript(path: &Path, output: &[u8]) -> Result<()> {
    std::fs::write(path, output)?;
    tracing::debug!(path = %path.display(), bytes = output.len(), "transcript written");
    Ok(())
}

fn print_verdict(result: &SessionResult) {
    if result.passed() {
        eprintln!(
            "{} {} ({} frames, {})",
            "✓".green().bold(),
            "PASS".green().bold(),
            result.summary.frames,
            result.summary.checksum_chain.dimmed()
        );
    } else {
        eprintln!(
            "{} {} ({} frames)",
            "✗".red().bold(),
            "FAIL".red().bold(),
            result.summary.frames
        );
        for error in &result.errors {
            eprintln!("  {}", error.red());
        }
    }
}
