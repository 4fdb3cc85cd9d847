//! WebSocket client side of a bridge session
//!
//! Opens the connection with bounded handshake timeouts and splits it into
//! an outbound half (driven by the step interpreter) and an inbound half
//! (owned by the reader task).

use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::error::ProtocolError;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::common::config::TransportConfig;
use crate::common::{Error, Result};

/// Concrete client stream type
pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Inbound half handed to the reader task
pub type WsReceiver = SplitStream<WsStream>;

/// Outbound side of a session, as seen by the step interpreter
#[async_trait]
pub trait Outbound: Send {
    /// Send raw terminal input as a binary frame
    async fn send_binary(&mut self, data: Vec<u8>) -> Result<()>;

    /// Send a control message as a text frame
    async fn send_text(&mut self, text: String) -> Result<()>;
}

/// Whether a tungstenite error just means the peer went away
pub fn is_closed(error: &WsError) -> bool {
    matches!(
        error,
        WsError::ConnectionClosed
            | WsError::AlreadyClosed
            | WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake)
    )
}

/// Outbound half of an open connection
pub struct WsSender {
    sink: SplitSink<WsStream, Message>,
    close_timeout: Duration,
}

impl WsSender {
    /// Send a close frame, bounded by the close timeout
    pub async fn close(mut self) -> Result<()> {
        match tokio::time::timeout(self.close_timeout, self.sink.close()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) if is_closed(&e) => Ok(()),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(Error::Transport(format!(
                "timed out after {} seconds closing connection",
                self.close_timeout.as_secs()
            ))),
        }
    }
}

#[async_trait]
impl Outbound for WsSender {
    async fn send_binary(&mut self, data: Vec<u8>) -> Result<()> {
        self.sink.send(Message::Binary(data.into())).await?;
        Ok(())
    }

    async fn send_text(&mut self, text: String) -> Result<()> {
        self.sink.send(Message::Text(text.into())).await?;
        Ok(())
    }
}

/// Open a connection to the bridge and split it
pub async fn connect(url: &str, config: &TransportConfig) -> Result<(WsSender, WsReceiver)> {
    let ws_config = WebSocketConfig::default()
        .max_message_size(Some(config.max_frame_bytes))
        .max_frame_size(Some(config.max_frame_bytes));

    tracing::info!(url, "connecting to bridge");
    let connecting = tokio_tungstenite::connect_async_with_config(url, Some(ws_config), true);
    let (ws, _response) = match tokio::time::timeout(config.open_timeout(), connecting).await {
        Ok(Ok(pair)) => pair,
        Ok(Err(e)) => return Err(Error::connect(url, e)),
        Err(_) => {
            return Err(Error::ConnectTimeout {
                url: url.to_string(),
                secs: config.open_timeout_secs,
            })
        }
    };
    tracing::info!(url, "connected");

    let (sink, stream) = ws.split();
    Ok((
        WsSender {
            sink,
            close_timeout: config.close_timeout(),
        },
        stream,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_counts_as_closed() {
        assert!(is_closed(&WsError::ConnectionClosed));
        assert!(is_closed(&WsError::Protocol(
            ProtocolError::ResetWithoutClosingHandshake
        )));
        assert!(!is_closed(&WsError::Io(std::io::Error::other("broken pipe"))));
    }

    #[tokio::test]
    async fn test_connect_refused_is_connect_error() {
        // Bind then drop to get a port nothing is listening on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let url = format!("ws://127.0.0.1:{}", port);
        let err = connect(&url, &TransportConfig::default()).await.err().unwrap();
        assert!(matches!(err, Error::Connect { .. }), "got {err:?}");
        assert!(err.to_string().contains(&url));
    }
}
