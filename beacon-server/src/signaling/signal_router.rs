use beacon_core::{ConnectionId, RoomId, ServerMessage, SignalEnvelope};
use tracing::{debug, warn};

use crate::registry::ConnectionRegistry;

/// Delivers server events to connections through the registry.
///
/// Delivery is fire-and-forget: a message is queued on the target's socket
/// and nothing waits for it to be written.
#[derive(Clone)]
pub struct SignalRouter {
    registry: ConnectionRegistry,
}

impl SignalRouter {
    pub fn new(registry: ConnectionRegistry) -> Self {
        Self { registry }
    }

    /// Forwards an envelope to `envelope.to`, stamped with its real sender.
    /// A missing target is logged and the envelope dropped.
    pub fn route(&self, envelope: SignalEnvelope) -> bool {
        let from = envelope.from;
        let to = envelope.to;
        let event = envelope.kind.event();

        let delivered = self.registry.send(&to, ServerMessage::relay(envelope));
        if delivered {
            debug!(%from, %to, "Forwarded {}", event);
        } else {
            warn!(%from, %to, "Dropping {}: target is not connected", event);
        }
        delivered
    }

    pub fn send_welcome(&self, conn_id: ConnectionId) {
        self.registry.send(&conn_id, ServerMessage::Welcome(conn_id));
    }

    pub fn send_participants(&self, joiner: ConnectionId, peers: Vec<ConnectionId>) {
        self.registry
            .send(&joiner, ServerMessage::RoomParticipants(peers));
    }

    pub fn send_error(&self, conn_id: ConnectionId, reason: impl Into<String>) {
        self.registry
            .send(&conn_id, ServerMessage::Error(reason.into()));
    }

    /// Tells every existing member that `joined` arrived, so each of them
    /// starts its own offer towards the newcomer.
    pub fn broadcast_join(&self, room: &RoomId, members: &[ConnectionId], joined: ConnectionId) {
        self.broadcast(room, members, joined, ServerMessage::UserConnected(joined));
    }

    /// Tells the remaining members to drop their state for `departed`.
    pub fn broadcast_leave(&self, room: &RoomId, members: &[ConnectionId], departed: ConnectionId) {
        self.broadcast(room, members, departed, ServerMessage::UserDisconnected(departed));
    }

    fn broadcast(
        &self,
        room: &RoomId,
        members: &[ConnectionId],
        subject: ConnectionId,
        msg: ServerMessage,
    ) {
        for member in members.iter().filter(|member| **member != subject) {
            if !self.registry.send(member, msg.clone()) {
                debug!(%room, "Skipping broadcast to departed member {}", member);
            }
        }
    }
}
