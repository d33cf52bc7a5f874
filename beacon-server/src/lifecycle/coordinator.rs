use beacon_core::{ClientMessage, ConnectionId, ProtocolError, RoomId, ServerMessage, SignalEnvelope, SignalKind};
use futures::future::join_all;
use serde::Serialize;
use serde_json::value::RawValue;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::lifecycle::spawn_sweeper;
use crate::registry::ConnectionRegistry;
use crate::room::RoomStore;
use crate::signaling::SignalRouter;
use crate::RelayError;

const JOIN_FAILED: &str = "Failed to join room";

/// Counts reported by the health endpoint.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct RelayStats {
    pub connections: usize,
    pub rooms: usize,
}

/// Ties the registry, room store and router together and turns client
/// events into room commands.
///
/// One instance is created at startup and cloned into every socket task.
#[derive(Clone)]
pub struct Coordinator {
    registry: ConnectionRegistry,
    rooms: RoomStore,
    router: SignalRouter,
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl Coordinator {
    pub fn new() -> Self {
        let registry = ConnectionRegistry::new();
        let router = SignalRouter::new(registry.clone());
        let rooms = RoomStore::new(registry.clone(), router.clone());

        Self {
            registry,
            rooms,
            router,
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn rooms(&self) -> &RoomStore {
        &self.rooms
    }

    pub fn stats(&self) -> RelayStats {
        RelayStats {
            connections: self.registry.len(),
            rooms: self.rooms.len(),
        }
    }

    /// Registers a new socket and greets it with its id.
    pub fn connect(&self, outbound: mpsc::UnboundedSender<ServerMessage>) -> ConnectionId {
        let conn_id = self.registry.register(outbound);
        self.router.send_welcome(conn_id);
        info!("New connection: {}", conn_id);
        conn_id
    }

    pub async fn handle(&self, conn_id: ConnectionId, msg: ClientMessage) {
        match msg {
            ClientMessage::JoinRoom(room_id) => {
                // A failed join has already been answered with an `error` event.
                if let Ok(peers) = self.join(conn_id, room_id).await {
                    debug!("{} joined with {} peer(s)", conn_id, peers.len());
                }
            }
            ClientMessage::LeaveRoom(room_id) => {
                self.leave(conn_id, &room_id).await;
            }
            ClientMessage::Signal { to, kind, payload } => {
                self.route(conn_id, to, kind, payload).await;
            }
        }
    }

    /// Handles a frame that failed to parse. Only a bad join gets an answer.
    pub fn reject(&self, conn_id: ConnectionId, err: ProtocolError) {
        match err {
            ProtocolError::InvalidRoomId => {
                warn!("Rejected join from {}: {}", conn_id, err);
                self.router
                    .send_error(conn_id, format!("{}: {}", JOIN_FAILED, err));
            }
            other => warn!("Invalid frame from {}: {}", conn_id, other),
        }
    }

    /// Join flow: the room replies to the joiner with the existing members and
    /// announces the joiner to them. Failures become an `error` event.
    pub async fn join(
        &self,
        conn_id: ConnectionId,
        room_id: RoomId,
    ) -> Result<Vec<ConnectionId>, RelayError> {
        let result = self.rooms.join_room(&room_id, conn_id).await;

        if let Err(e) = &result {
            error!(room = %room_id, "Error in join-room for {}: {}", conn_id, e);
            self.router.send_error(conn_id, JOIN_FAILED);
        }
        result
    }

    /// Explicit leave. Returns whether the connection was in the room.
    pub async fn leave(&self, conn_id: ConnectionId, room_id: &RoomId) -> bool {
        self.rooms.leave_room(room_id, conn_id).await
    }

    /// Tears down a connection: unregisters it and leaves every room it was in.
    /// Only the first call for a given id does anything.
    pub async fn disconnect(&self, conn_id: ConnectionId) {
        let Some(rooms) = self.registry.unregister(&conn_id) else {
            return;
        };

        join_all(
            rooms
                .iter()
                .map(|room_id| self.rooms.leave_room(room_id, conn_id)),
        )
        .await;

        info!("User disconnected: {}", conn_id);
    }

    /// Forwards an offer/answer/candidate through a room both ends share.
    /// Unknown or unrelated targets are dropped without telling the sender.
    pub async fn route(
        &self,
        from: ConnectionId,
        to: ConnectionId,
        kind: SignalKind,
        payload: Box<RawValue>,
    ) -> bool {
        let Some(room_id) = self.registry.shared_room(&from, &to) else {
            warn!(%from, %to, "Dropping {}: no shared room", kind.event());
            return false;
        };

        let envelope = SignalEnvelope {
            from,
            to,
            kind,
            payload,
        };
        self.rooms.relay(&room_id, envelope).await
    }

    pub async fn room_members(&self, room_id: &RoomId) -> Option<Vec<ConnectionId>> {
        self.rooms.members(room_id).await
    }

    pub async fn sweep_inactive(&self, max_age: Duration) -> usize {
        self.rooms.sweep_inactive(max_age).await
    }

    /// Starts the periodic sweep. Abort the handle to stop it.
    pub fn spawn_sweeper(&self, every: Duration, max_age: Duration) -> JoinHandle<()> {
        spawn_sweeper(self.rooms.clone(), every, max_age)
    }
}
