//! Step interpreter
//!
//! Turns one declarative step into transport actions and recorder calls,
//! bracketed by `step_start` / `step_end` events.

use std::time::{Duration, Instant};

use base64::Engine;
use serde::Serialize;

use crate::common::config::SettleConfig;
use crate::common::Result;
use crate::session::digest::{hex_digest, tagged};
use crate::session::events::{Event, InputEvent, StepEndEvent, StepStartEvent};
use crate::session::SharedRecorder;
use crate::transport::Outbound;

use super::config::{decode_payload, Step, StepAction};

/// Resize control message, sent as a text frame
#[derive(Serialize)]
struct ResizeMessage {
    #[serde(rename = "type")]
    kind: &'static str,
    cols: u16,
    rows: u16,
}

/// Render the resize control message
pub fn resize_message(cols: u16, rows: u16) -> Result<String> {
    let message = serde_json::to_string(&ResizeMessage {
        kind: "resize",
        cols,
        rows,
    })?;
    Ok(message)
}

/// `NNN:type` label used in step events
pub fn step_name(index: usize, step: &Step) -> String {
    format!("{:03}:{}", index, step.action.kind())
}

/// Executes scenario steps against one connection
pub struct StepInterpreter<'a, O: Outbound> {
    recorder: SharedRecorder,
    outbound: &'a mut O,
    drain: Duration,
}

impl<'a, O: Outbound> StepInterpreter<'a, O> {
    pub fn new(recorder: SharedRecorder, outbound: &'a mut O, settle: &SettleConfig) -> Self {
        Self {
            recorder,
            outbound,
            drain: Duration::from_millis(settle.drain_ms),
        }
    }

    /// Run one step; transport and decode failures are returned, not swallowed
    pub async fn execute(&mut self, index: usize, step: &Step) -> Result<()> {
        let name = step_name(index, step);
        {
            let mut rec = self.recorder.lock().await;
            let geometry = rec.geometry_tag();
            rec.emit(Event::StepStart(StepStartEvent {
                step: name.clone(),
                geometry,
            }))?;
        }
        tracing::debug!(step = %name, "step started");

        let started = Instant::now();
        let outcome = self.act(index, step).await;
        let status = if outcome.is_ok() { "passed" } else { "failed" };

        let ended = {
            let mut rec = self.recorder.lock().await;
            let geometry = rec.geometry_tag();
            rec.emit(Event::StepEnd(StepEndEvent {
                step: name.clone(),
                status,
                duration_ms: started.elapsed().as_millis() as u64,
                geometry,
            }))
        };
        tracing::debug!(step = %name, status, "step finished");

        outcome?;
        ended
    }

    async fn act(&mut self, index: usize, step: &Step) -> Result<()> {
        if step.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(step.delay_ms)).await;
        }

        match &step.action {
            StepAction::Send {
                data_hex,
                data_b64,
                data,
                input_type,
            } => {
                let payload = decode_payload(
                    index,
                    data_hex.as_deref(),
                    data_b64.as_deref(),
                    data.as_deref(),
                )?;
                self.outbound.send_binary(payload.clone()).await?;

                let mut rec = self.recorder.lock().await;
                rec.record_send(&payload);
                let geometry = rec.geometry_tag();
                rec.emit(Event::Input(InputEvent {
                    input_type: input_type.clone(),
                    encoding: "base64",
                    bytes_b64: Some(base64::engine::general_purpose::STANDARD.encode(&payload)),
                    input_hash: tagged(&hex_digest(&payload)),
                    details: step.comment.clone().unwrap_or_default(),
                    geometry,
                }))
            }
            StepAction::Resize { cols, rows } => {
                let message = resize_message(*cols, *rows)?;
                self.outbound.send_text(message.clone()).await?;

                let mut rec = self.recorder.lock().await;
                rec.record_send(message.as_bytes());
                rec.set_geometry(*cols, *rows);
                let geometry = rec.geometry_tag();
                rec.emit(Event::Input(InputEvent {
                    input_type: "resize".to_string(),
                    encoding: "json",
                    bytes_b64: None,
                    input_hash: tagged(&hex_digest(message.as_bytes())),
                    details: step.comment.clone().unwrap_or_default(),
                    geometry,
                }))
            }
            StepAction::Wait { duration_ms } => {
                tokio::time::sleep(Duration::from_millis(*duration_ms)).await;
                Ok(())
            }
            StepAction::Drain => {
                tokio::time::sleep(self.drain).await;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{EngineConfig, Error};
    use crate::session::Recorder;
    use async_trait::async_trait;

    #[derive(Debug, PartialEq)]
    enum Sent {
        Binary(Vec<u8>),
        Text(String),
    }

    #[derive(Default)]
    struct RecordingOutbound {
        sent: Vec<Sent>,
    }

    #[async_trait]
    impl Outbound for RecordingOutbound {
        async fn send_binary(&mut self, data: Vec<u8>) -> Result<()> {
            self.sent.push(Sent::Binary(data));
            Ok(())
        }

        async fn send_text(&mut self, text: String) -> Result<()> {
            self.sent.push(Sent::Text(text));
            Ok(())
        }
    }

    struct ClosedOutbound;

    #[async_trait]
    impl Outbound for ClosedOutbound {
        async fn send_binary(&mut self, _data: Vec<u8>) -> Result<()> {
            Err(Error::ConnectionClosed)
        }

        async fn send_text(&mut self, _text: String) -> Result<()> {
            Err(Error::ConnectionClosed)
        }
    }

    fn step(json: &str) -> Step {
        serde_json::from_str(json).unwrap()
    }

    fn events(recorder: &Recorder) -> Vec<serde_json::Value> {
        recorder
            .events()
            .iter()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    fn setup() -> (SharedRecorder, SettleConfig) {
        let recorder =
            Recorder::new(&EngineConfig::default(), "remote-00000000", "interp", 120, 40)
                .into_shared();
        let settle = SettleConfig {
            drain_ms: 10,
            final_ms: 10,
        };
        (recorder, settle)
    }

    #[test]
    fn test_resize_message_shape() {
        assert_eq!(
            resize_message(80, 24).unwrap(),
            r#"{"type":"resize","cols":80,"rows":24}"#
        );
    }

    #[tokio::test]
    async fn test_send_step() {
        let (recorder, settle) = setup();
        let mut outbound = RecordingOutbound::default();
        let mut interp = StepInterpreter::new(recorder.clone(), &mut outbound, &settle);

        interp
            .execute(0, &step(r#"{"type":"send","data_hex":"6c730a","comment":"list"}"#))
            .await
            .unwrap();

        assert_eq!(outbound.sent, vec![Sent::Binary(b"ls\n".to_vec())]);

        let rec = recorder.lock().await;
        let summary = rec.summary();
        assert_eq!(summary.ws_in_bytes, 3);
        assert_eq!(summary.messages_tx, 1);

        let log = events(&rec);
        let kinds: Vec<&str> = log.iter().map(|e| e["type"].as_str().unwrap()).collect();
        assert_eq!(kinds, vec!["step_start", "input", "step_end"]);
        assert_eq!(log[0]["step"], "000:send");
        assert_eq!(log[1]["bytes_b64"], "bHMK");
        assert_eq!(log[1]["input_hash"], format!("sha256:{}", hex_digest(b"ls\n")));
        assert_eq!(log[1]["details"], "list");
        assert_eq!(log[1]["input_type"], "keys");
        assert_eq!(log[2]["status"], "passed");
    }

    #[tokio::test]
    async fn test_resize_step_updates_geometry() {
        let (recorder, settle) = setup();
        let mut outbound = RecordingOutbound::default();
        let mut interp = StepInterpreter::new(recorder.clone(), &mut outbound, &settle);

        interp
            .execute(4, &step(r#"{"type":"resize","cols":80,"rows":24}"#))
            .await
            .unwrap();

        let message = resize_message(80, 24).unwrap();
        assert_eq!(outbound.sent, vec![Sent::Text(message.clone())]);

        let rec = recorder.lock().await;
        assert_eq!(rec.geometry(), (80, 24));
        assert_eq!(rec.summary().ws_in_bytes, message.len() as u64);

        let log = events(&rec);
        // step_start carries the old geometry, input and step_end the new one.
        assert_eq!(log[0]["step"], "004:resize");
        assert_eq!(log[0]["cols"], 120);
        assert_eq!(log[1]["input_type"], "resize");
        assert_eq!(log[1]["encoding"], "json");
        assert_eq!(log[1]["hash_key"], "remote-80x24-seed0");
        assert_eq!(log[2]["rows"], 24);
    }

    #[tokio::test]
    async fn test_wait_and_drain_do_not_touch_transport() {
        let (recorder, settle) = setup();
        let mut outbound = RecordingOutbound::default();
        let mut interp = StepInterpreter::new(recorder.clone(), &mut outbound, &settle);

        let started = Instant::now();
        interp
            .execute(0, &step(r#"{"type":"wait","ms":30}"#))
            .await
            .unwrap();
        interp.execute(1, &step(r#"{"type":"drain"}"#)).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(40));

        assert!(outbound.sent.is_empty());
        assert_eq!(recorder.lock().await.events().len(), 4);
    }

    #[tokio::test]
    async fn test_pre_delay_is_applied() {
        let (recorder, settle) = setup();
        let mut outbound = RecordingOutbound::default();
        let mut interp = StepInterpreter::new(recorder, &mut outbound, &settle);

        let started = Instant::now();
        interp
            .execute(0, &step(r#"{"type":"send","data":"x","delay_ms":25}"#))
            .await
            .unwrap();
        assert!(started.elapsed() >= Duration::from_millis(25));
    }

    #[tokio::test]
    async fn test_transport_failure_propagates() {
        let (recorder, settle) = setup();
        let mut outbound = ClosedOutbound;
        let mut interp = StepInterpreter::new(recorder.clone(), &mut outbound, &settle);

        let err = interp
            .execute(2, &step(r#"{"type":"send","data":"x"}"#))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ConnectionClosed));

        let rec = recorder.lock().await;
        assert_eq!(rec.summary().messages_tx, 0);
        let log = events(&rec);
        assert_eq!(log.last().unwrap()["type"], "step_end");
        assert_eq!(log.last().unwrap()["status"], "failed");
    }

    #[tokio::test]
    async fn test_bad_payload_fails_before_sending() {
        let (recorder, settle) = setup();
        let mut outbound = RecordingOutbound::default();
        let mut interp = StepInterpreter::new(recorder, &mut outbound, &settle);

        let err = interp
            .execute(0, &step(r#"{"type":"send","data_b64":"***"}"#))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Decode { encoding: "base64", .. }));
        assert!(outbound.sent.is_empty());
    }
}
