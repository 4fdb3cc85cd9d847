//! Session runner
//!
//! Owns the connection lifecycle: connect, run the reader alongside the
//! scripted steps, settle, cancel the reader, then summarize and compare
//! against an optional golden baseline. A `run_end` event is always written
//! once the preamble succeeded, whatever happened in between.

use std::fmt;
use std::path::Path;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::common::{probe, EngineConfig, Error, Result};
use crate::session::events::{
    AssertEvent, BrowserEnvEvent, EnvEvent, ErrorEvent, Event, RunEndEvent, RunStartEvent,
    WsMetricsEvent,
};
use crate::session::{SharedRecorder, Summary};
use crate::transport::{self, ReaderTask};

use super::config::{GoldenBaseline, Scenario};
use super::interpreter::StepInterpreter;

/// Lifecycle phase of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Opening the WebSocket
    Connecting,
    /// Reader active, steps executing
    Running,
    /// Steps done, waiting for in-flight output
    Draining,
    /// Reader stopped cleanly, summary computed
    Completed,
    /// A transport or step failure occurred
    Errored,
}

impl SessionPhase {
    /// Whether `next` is a legal transition from this phase
    pub fn can_advance_to(self, next: SessionPhase) -> bool {
        use SessionPhase::*;
        matches!(
            (self, next),
            (Connecting, Running)
                | (Running, Draining)
                | (Draining, Completed)
                | (Connecting | Running | Draining, Errored)
        )
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "connecting"),
            Self::Running => write!(f, "running"),
            Self::Draining => write!(f, "draining"),
            Self::Completed => write!(f, "completed"),
            Self::Errored => write!(f, "errored"),
        }
    }
}

/// Overall verdict of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Pass,
    Fail,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Pass => "pass",
            Outcome::Fail => "fail",
        }
    }
}

/// Process-level result: verdict, failures, and the session summary
#[derive(Debug, Clone, Serialize)]
pub struct SessionResult {
    pub outcome: Outcome,
    pub errors: Vec<String>,
    #[serde(flatten)]
    pub summary: Summary,
    #[serde(skip)]
    pub phase: SessionPhase,
}

impl SessionResult {
    pub fn passed(&self) -> bool {
        self.outcome == Outcome::Pass
    }

    /// Zero iff the run passed
    pub fn exit_code(&self) -> i32 {
        if self.passed() {
            0
        } else {
            1
        }
    }
}

/// Caller-provided context for one run
#[derive(Debug, Clone, Default)]
pub struct SessionOptions<'a> {
    /// Bridge URL
    pub url: &'a str,
    /// Golden baseline to compare against; a missing file skips the check
    pub golden: Option<&'a Path>,
    /// Command line reported in `run_start`
    pub command: String,
    /// Directory of the JSONL log
    pub log_dir: String,
    /// Directory for result artifacts
    pub results_dir: String,
}

/// Phase bookkeeping plus the accumulated failure list
struct Verdict {
    phase: SessionPhase,
    errors: Vec<String>,
}

impl Verdict {
    fn new() -> Self {
        Self {
            phase: SessionPhase::Connecting,
            errors: Vec::new(),
        }
    }

    fn advance(&mut self, next: SessionPhase) {
        if self.phase.can_advance_to(next) {
            tracing::debug!(from = %self.phase, to = %next, "session phase");
            self.phase = next;
        } else {
            tracing::trace!(from = %self.phase, to = %next, "phase transition ignored");
        }
    }

    /// Record a failure once; repeated identical messages are not duplicated
    fn push(&mut self, message: String) -> bool {
        if self.errors.contains(&message) {
            return false;
        }
        self.errors.push(message);
        true
    }

    fn outcome(&self) -> Outcome {
        if self.errors.is_empty() {
            Outcome::Pass
        } else {
            Outcome::Fail
        }
    }
}

/// Record a transport/step failure: error event, verdict entry, Errored
async fn fail_session(recorder: &SharedRecorder, verdict: &mut Verdict, error: Error) -> Result<()> {
    let message = error.to_string();
    tracing::warn!(phase = %verdict.phase, error = %message, "session failure");
    verdict.advance(SessionPhase::Errored);
    if verdict.push(message.clone()) {
        recorder
            .lock()
            .await
            .emit(Event::Error(ErrorEvent { message }))?;
    }
    Ok(())
}

/// Emit the `env`, `browser_env` and `run_start` events
async fn emit_preamble(
    config: &EngineConfig,
    scenario: &Scenario,
    recorder: &SharedRecorder,
    options: &SessionOptions<'_>,
) -> Result<()> {
    let env = EnvEvent {
        host: probe::host_name(),
        rustc: probe::command_version("rustc").await,
        cargo: probe::command_version("cargo").await,
        git_commit: probe::git_sha().await,
        git_dirty: probe::git_dirty().await,
        deterministic: config.deterministic,
        term: probe::env_or_empty("TERM"),
        colorterm: probe::env_or_empty("COLORTERM"),
        no_color: probe::env_or_empty("NO_COLOR"),
        scenario: scenario.name.clone(),
        initial_cols: scenario.initial_cols,
        initial_rows: scenario.initial_rows,
    };

    let browser = BrowserEnvEvent {
        browser: std::env::var("E2E_BROWSER").unwrap_or_else(|_| "tokio-tungstenite".to_string()),
        browser_version: probe::env_or_empty("E2E_BROWSER_VERSION"),
        user_agent: std::env::var("E2E_BROWSER_USER_AGENT")
            .unwrap_or_else(|_| format!("term-e2e/{}", env!("CARGO_PKG_VERSION"))),
        dpr: std::env::var("E2E_BROWSER_DPR")
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(1.0),
        platform: probe::platform(),
        locale: probe::env_or_empty("LANG"),
        timezone: probe::env_or_empty("TZ"),
        headless: std::env::var("E2E_HEADLESS")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(true),
    };

    let run_start = RunStartEvent {
        command: options.command.clone(),
        log_dir: options.log_dir.clone(),
        results_dir: options.results_dir.clone(),
        scenario: scenario.name.clone(),
        step_count: scenario.steps.len(),
        timeout_s: scenario.timeout_s,
    };

    let mut rec = recorder.lock().await;
    rec.emit(Event::Env(env))?;
    rec.emit(Event::BrowserEnv(browser))?;
    rec.emit(Event::RunStart(run_start))
}

/// Compare the summary against a golden baseline, emitting an `assert` event
async fn compare_golden(
    recorder: &SharedRecorder,
    verdict: &mut Verdict,
    golden: &GoldenBaseline,
    summary: &Summary,
) -> Result<()> {
    let expected = &golden.checksum_chain;
    let actual = &summary.checksum_chain;

    let event = if !expected.is_empty() && expected != actual {
        let message = format!(
            "Golden checksum mismatch: expected {}, got {}",
            expected, actual
        );
        tracing::warn!(%expected, %actual, "golden checksum mismatch");
        verdict.push(message);
        AssertEvent {
            assertion: "golden_checksum_chain".to_string(),
            status: "failed",
            details: format!(
                "expected={} actual={} frames_expected={} frames_actual={}",
                expected,
                actual,
                golden.frames.unwrap_or(-1),
                summary.frames
            ),
        }
    } else {
        AssertEvent {
            assertion: "golden_checksum_chain".to_string(),
            status: "passed",
            details: format!("checksum={} frames={}", actual, summary.frames),
        }
    };

    recorder.lock().await.emit(Event::Assert(event))
}

/// Execute a scripted session against the bridge
///
/// Transport and step failures never abort summarization; they only turn
/// the verdict to fail. An `Err` is returned only when the event log itself
/// cannot be written.
pub async fn run_session(
    config: &EngineConfig,
    scenario: &Scenario,
    recorder: SharedRecorder,
    options: &SessionOptions<'_>,
) -> Result<SessionResult> {
    let run_started = Instant::now();
    emit_preamble(config, scenario, &recorder, options).await?;

    let mut verdict = Verdict::new();

    match transport::connect(options.url, &config.transport).await {
        Err(e) => fail_session(&recorder, &mut verdict, e).await?,
        Ok((mut sender, receiver)) => {
            verdict.advance(SessionPhase::Running);
            let reader = ReaderTask::spawn(receiver, recorder.clone());

            {
                let mut interpreter =
                    StepInterpreter::new(recorder.clone(), &mut sender, &config.settle);
                for (index, step) in scenario.steps.iter().enumerate() {
                    if let Err(e) = interpreter.execute(index, step).await {
                        // Remaining steps are skipped; draining still happens.
                        fail_session(&recorder, &mut verdict, e).await?;
                        break;
                    }
                }
            }

            verdict.advance(SessionPhase::Draining);
            if reader.is_finished() {
                tracing::debug!("reader stopped before draining");
            }
            tokio::time::sleep(Duration::from_millis(config.settle.final_ms)).await;
            if let Some(e) = reader.cancel().await {
                fail_session(&recorder, &mut verdict, e).await?;
            }

            if let Err(e) = sender.close().await {
                tracing::warn!(error = %e, "closing connection failed");
            }
            tracing::info!(url = options.url, "disconnected");
        }
    }

    verdict.advance(SessionPhase::Completed);
    let summary = recorder.lock().await.summary();

    if let Some(path) = options.golden {
        match GoldenBaseline::load(path) {
            Ok(Some(golden)) => compare_golden(&recorder, &mut verdict, &golden, &summary).await?,
            Ok(None) => tracing::info!(path = %path.display(), "golden baseline absent, skipping"),
            Err(e) => {
                // The log must still be finalized, so this is a verdict entry, not an abort.
                let message = e.to_string();
                if verdict.push(message.clone()) {
                    recorder
                        .lock()
                        .await
                        .emit(Event::Error(ErrorEvent { message }))?;
                }
            }
        }
    }

    let outcome = verdict.outcome();
    {
        let mut rec = recorder.lock().await;
        rec.emit(Event::WsMetrics(WsMetricsEvent {
            label: scenario.name.clone(),
            ws_url: options.url.to_string(),
            bytes_tx: summary.ws_in_bytes,
            bytes_rx: summary.ws_out_bytes,
            messages_tx: summary.messages_tx,
            messages_rx: summary.messages_rx,
            latency_histogram_ms: summary.frame_gap_histogram_ms,
        }))?;
        rec.emit(Event::RunEnd(RunEndEvent {
            status: if outcome == Outcome::Pass {
                "passed"
            } else {
                "failed"
            },
            duration_ms: run_started.elapsed().as_millis() as u64,
            failed_count: verdict.errors.len(),
            outcome: outcome.as_str(),
            ws_in_bytes: summary.ws_in_bytes,
            ws_out_bytes: summary.ws_out_bytes,
            frames: summary.frames,
            output_sha256: summary.output_sha256.clone(),
            checksum_chain: summary.checksum_chain.clone(),
        }))?;
    }

    tracing::info!(
        scenario = %scenario.name,
        outcome = outcome.as_str(),
        frames = summary.frames,
        phase = %verdict.phase,
        "session finished"
    );

    Ok(SessionResult {
        outcome,
        errors: verdict.errors,
        summary,
        phase: verdict.phase,
    })
}
