//! Error types for platform adapters.

use thiserror::Error;

/// Errors raised by adapter lifecycle and request operations.
///
/// `send_message` never returns these; send failures are reported through
/// [`crate::SendOutcome`].
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("adapter for {0} is not connected")]
    NotConnected(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("websocket error: {0}")]
    WebSocket(#[from] Box<tokio_tungstenite::tungstenite::Error>),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid adapter configuration: {0}")]
    InvalidConfig(String),

    #[error("operation not supported: {0}")]
    Unsupported(&'static str),
}

impl From<tokio_tungstenite::tungstenite::Error> for AdapterError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        AdapterError::WebSocket(Box::new(e))
    }
}
