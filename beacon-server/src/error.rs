use beacon_core::{ConnectionId, RoomId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("connection {0} is not registered")]
    ConnectionNotFound(ConnectionId),

    /// The room retired between lookup and processing. Callers retry on a fresh room.
    #[error("room '{0}' closed while the request was queued")]
    RoomClosed(RoomId),

    #[error("room '{0}' is not accepting commands")]
    RoomUnavailable(RoomId),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
