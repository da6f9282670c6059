//! Crate-wide error type.
//!
//! `InvalidParams` never reaches the protocol layer: callers redirect to the
//! entry screen instead of connecting. `JoinRejected` and `Timeout` come back
//! from `Connection::open`. `SendFailed` and `TransportLost` happen after the
//! session is live, so the connection reports them as notices.

use crate::identity::InvalidParams;

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error(transparent)]
    InvalidParams(#[from] InvalidParams),
    #[error("join rejected: {0}")]
    JoinRejected(String),
    #[error("send failed: {0}")]
    SendFailed(String),
    #[error("connection lost: {0}")]
    TransportLost(String),
    #[error("invalid backend URL: {0}")]
    InvalidEndpoint(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("websocket error: {0}")]
    Ws(Box<tokio_tungstenite::tungstenite::Error>),
    #[error("packet decode failed: {0}")]
    Decode(#[from] packets::CodecError),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("terminal I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),
    #[error("session is closed")]
    Closed,
}

impl From<tokio_tungstenite::tungstenite::Error> for ChatError {
    fn from(error: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Ws(Box::new(error))
    }
}
