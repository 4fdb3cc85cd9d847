//! Error types for the remote terminal e2e driver
//!
//! Messages end up verbatim in the result's `errors` list and in `error`
//! events, so they name the failing operation and the underlying cause.

use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the e2e driver
#[derive(Error, Debug)]
pub enum Error {
    // === Transport Errors ===
    #[error("Failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },

    #[error("Timed out after {secs} seconds opening connection to {url}")]
    ConnectTimeout { url: String, secs: u64 },

    #[error("WebSocket transport error: {0}")]
    Transport(String),

    #[error("Connection closed by bridge")]
    ConnectionClosed,

    // === Scenario Errors ===
    #[error("Failed to decode {encoding} payload in step {step}: {reason}")]
    Decode {
        step: usize,
        encoding: &'static str,
        reason: String,
    },

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Golden Errors ===
    #[error("Invalid golden baseline '{path}': {error}")]
    GoldenParse { path: String, error: String },

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a connect error for the given URL
    pub fn connect<E: std::fmt::Display>(url: &str, reason: E) -> Self {
        Self::Connect {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create a payload decode error
    pub fn decode<E: std::fmt::Display>(step: usize, encoding: &'static str, reason: E) -> Self {
        Self::Decode {
            step,
            encoding,
            reason: reason.to_string(),
        }
    }

    /// Create a file read error
    pub fn file_read<E: std::fmt::Display>(path: &std::path::Path, error: E) -> Self {
        Self::FileRead {
            path: path.display().to_string(),
            error: error.to_string(),
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        if crate::transport::is_closed(&e) {
            Error::ConnectionClosed
        } else {
            Error::Transport(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_websocket_maps_to_connection_closed() {
        let err: Error = tokio_tungstenite::tungstenite::Error::ConnectionClosed.into();
        assert!(matches!(err, Error::ConnectionClosed));
    }

    #[test]
    fn test_decode_error_message_names_step() {
        let err = Error::decode(3, "hex", "odd number of digits");
        assert_eq!(
            err.to_string(),
            "Failed to decode hex payload in step 3: odd number of digits"
        );
    }
}
