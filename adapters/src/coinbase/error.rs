use std::time::Duration;

use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// A single frame could not be turned into a [`FeedMessage`](super::FeedMessage).
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("frame has no \"type\" field")]
    MissingType,

    #[error("field {field} is not a number: {value:?}")]
    InvalidNumber { field: &'static str, value: String },
}

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("websocket error: {0}")]
    Ws(#[from] tungstenite::Error),

    #[error("timed out during {0} after {1:?}")]
    Timeout(&'static str, Duration),

    #[error("{action} rejected: {message} ({reason})")]
    Rejected {
        action: &'static str,
        message: String,
        reason: String,
    },

    #[error("connection closed: {0}")]
    Closed(&'static str),

    #[error("cannot decode handshake reply: {0}")]
    Decode(#[from] DecodeError),

    #[error("cannot encode request: {0}")]
    Encode(#[from] serde_json::Error),
}
