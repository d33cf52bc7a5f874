use beacon_core::{ConnectionId, SignalEnvelope};
use std::time::Duration;
use tokio::sync::oneshot;

use crate::RelayError;

/// Commands processed one at a time by a room's event loop.
#[derive(Debug)]
pub enum RoomCommand {
    /// Add a connection. Replies with the other members.
    Join {
        conn_id: ConnectionId,
        reply: oneshot::Sender<Result<Vec<ConnectionId>, RelayError>>,
    },

    /// Remove a connection (explicit leave or socket teardown).
    /// Replies whether it was a member.
    Leave {
        conn_id: ConnectionId,
        reply: oneshot::Sender<bool>,
    },

    /// Forward an offer/answer/candidate between two members.
    Relay {
        envelope: SignalEnvelope,
        reply: oneshot::Sender<bool>,
    },

    /// Retire the room if it is empty and older than `max_age`.
    Sweep {
        max_age: Duration,
        reply: oneshot::Sender<bool>,
    },

    Members {
        reply: oneshot::Sender<Vec<ConnectionId>>,
    },
}
