//! Inbound reader task
//!
//! Forwards every inbound text/binary message to the recorder, in arrival
//! order, until the bridge closes or the task is cancelled.

use futures_util::{Stream, StreamExt};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use crate::common::{Error, Result};
use crate::session::SharedRecorder;

use super::client::is_closed;

/// Read until the stream ends, returning the number of messages recorded
pub async fn read_loop<S>(mut stream: S, recorder: SharedRecorder) -> Result<u64>
where
    S: Stream<Item = std::result::Result<Message, WsError>> + Unpin,
{
    let mut received = 0u64;

    while let Some(message) = stream.next().await {
        let data = match message {
            Ok(Message::Binary(bytes)) => bytes.to_vec(),
            Ok(Message::Text(text)) => text.as_str().as_bytes().to_vec(),
            Ok(Message::Close(frame)) => {
                tracing::debug!(?frame, "bridge sent close");
                break;
            }
            // Ping/pong are answered by tungstenite itself.
            Ok(_) => continue,
            Err(e) if is_closed(&e) => {
                tracing::debug!(error = %e, "connection closed");
                break;
            }
            Err(e) => return Err(e.into()),
        };

        let mut rec = recorder.lock().await;
        rec.record_receive();
        rec.record_output(&data)?;
        received += 1;
    }

    Ok(received)
}

/// Handle to a spawned reader
pub struct ReaderTask {
    handle: JoinHandle<Result<u64>>,
}

impl ReaderTask {
    /// Spawn `read_loop` on the runtime
    pub fn spawn<S>(stream: S, recorder: SharedRecorder) -> Self
    where
        S: Stream<Item = std::result::Result<Message, WsError>> + Unpin + Send + 'static,
    {
        Self {
            handle: tokio::spawn(read_loop(stream, recorder)),
        }
    }

    /// Whether the reader already stopped on its own
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Cancel the reader and wait until it has fully stopped
    ///
    /// Returns the reader's own failure, if it ended with one before
    /// cancellation took effect.
    pub async fn cancel(self) -> Option<Error> {
        self.handle.abort();
        match self.handle.await {
            Ok(Ok(received)) => {
                tracing::debug!(received, "reader finished before cancellation");
                None
            }
            Ok(Err(e)) => Some(e),
            Err(join) if join.is_cancelled() => {
                tracing::debug!("reader cancelled");
                None
            }
            Err(join) => Some(Error::Internal(format!("reader task failed: {}", join))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::EngineConfig;
    use crate::session::Recorder;
    use tokio::sync::mpsc;

    fn shared_recorder() -> SharedRecorder {
        Recorder::new(&EngineConfig::default(), "remote-00000000", "reader", 80, 24).into_shared()
    }

    type Item = std::result::Result<Message, WsError>;

    fn channel_stream(
        rx: mpsc::UnboundedReceiver<Item>,
    ) -> impl Stream<Item = Item> + Unpin + Send + 'static {
        Box::pin(futures_util::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        }))
    }

    #[tokio::test]
    async fn test_text_and_binary_are_normalized() {
        let recorder = shared_recorder();
        let items: Vec<Item> = vec![
            Ok(Message::Binary(b"ab".to_vec().into())),
            Ok(Message::Ping(Vec::new().into())),
            Ok(Message::Text("cd".to_string().into())),
            Ok(Message::Close(None)),
            Ok(Message::Binary(b"ignored".to_vec().into())),
        ];

        let received = read_loop(futures_util::stream::iter(items), recorder.clone())
            .await
            .unwrap();
        assert_eq!(received, 2);

        let rec = recorder.lock().await;
        assert_eq!(rec.full_output(), b"abcd");
        let summary = rec.summary();
        assert_eq!(summary.messages_rx, 2);
        assert_eq!(summary.frames, 2);
    }

    #[tokio::test]
    async fn test_connection_closed_ends_quietly() {
        let recorder = shared_recorder();
        let items: Vec<Item> = vec![
            Ok(Message::Binary(b"x".to_vec().into())),
            Err(WsError::ConnectionClosed),
        ];
        let received = read_loop(futures_util::stream::iter(items), recorder)
            .await
            .unwrap();
        assert_eq!(received, 1);
    }

    #[tokio::test]
    async fn test_transport_error_is_returned() {
        let recorder = shared_recorder();
        let items: Vec<Item> = vec![Err(WsError::Io(std::io::Error::other("reset")))];
        let err = read_loop(futures_util::stream::iter(items), recorder)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }

    #[tokio::test]
    async fn test_no_frames_after_cancellation() {
        let recorder = shared_recorder();
        let (tx, rx) = mpsc::unbounded_channel();
        let reader = ReaderTask::spawn(channel_stream(rx), recorder.clone());

        tx.send(Ok(Message::Binary(b"early".to_vec().into()))).unwrap();
        // Wait until the reader has consumed the first frame.
        for _ in 0..100 {
            if recorder.lock().await.frames() == 1 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert_eq!(recorder.lock().await.frames(), 1);

        assert!(reader.cancel().await.is_none());

        // The stream was dropped with the task, so late frames have nowhere to go.
        assert!(tx.send(Ok(Message::Binary(b"late".to_vec().into()))).is_err());
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let rec = recorder.lock().await;
        assert_eq!(rec.frames(), 1);
        assert_eq!(rec.full_output(), b"early");
    }
}
