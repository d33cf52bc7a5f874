use thiserror::Error;

/// Reasons a client frame could not be turned into a [`crate::ClientMessage`].
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown event '{0}'")]
    UnknownEvent(String),

    #[error("room id must not be empty")]
    InvalidRoomId,

    #[error("invalid connection id '{0}'")]
    InvalidConnectionId(String),
}
