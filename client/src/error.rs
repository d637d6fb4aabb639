//! Error types for the client runtime

use thiserror::Error;
use tokio_tungstenite::tungstenite;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] tungstenite::Error),

    #[error("credential token cannot be sent as a header")]
    InvalidToken,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures when changing or persisting the binding table
#[derive(Debug, Error)]
pub enum BindingError {
    #[error("{key} is already assigned to another control ({bound_to})")]
    Conflict { key: String, bound_to: String },

    #[error("could not write controls: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not encode controls: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("no credential token stored")]
    Missing,

    #[error("credential token is malformed")]
    Malformed,

    #[error("credential token expired")]
    Expired,
}
