use beacon_core::{ConnectionId, RoomId, ServerMessage};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::error;

struct ConnectionEntry {
    outbound: mpsc::UnboundedSender<ServerMessage>,
    rooms: HashSet<RoomId>,
}

/// Live connections and the rooms each one has joined.
///
/// The room set is only changed by room actors (attach/detach) and by
/// [`ConnectionRegistry::unregister`]; all three run under the same shard
/// lock, so a join racing a disconnect either sees the connection gone or
/// leaves its room in the set that `unregister` hands back.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    connections: Arc<DashMap<ConnectionId, ConnectionEntry>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, outbound: mpsc::UnboundedSender<ServerMessage>) -> ConnectionId {
        loop {
            let id = ConnectionId::new();
            if let Entry::Vacant(slot) = self.connections.entry(id) {
                slot.insert(ConnectionEntry {
                    outbound,
                    rooms: HashSet::new(),
                });
                return id;
            }
        }
    }

    /// Removes the connection and returns the rooms it was in.
    /// Returns `None` if it was already gone.
    pub fn unregister(&self, id: &ConnectionId) -> Option<HashSet<RoomId>> {
        self.connections.remove(id).map(|(_, entry)| entry.rooms)
    }

    pub fn is_registered(&self, id: &ConnectionId) -> bool {
        self.connections.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn rooms_of(&self, id: &ConnectionId) -> Vec<RoomId> {
        self.connections
            .get(id)
            .map(|entry| entry.rooms.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// A room both connections are currently in, if any.
    pub fn shared_room(&self, a: &ConnectionId, b: &ConnectionId) -> Option<RoomId> {
        let rooms_of_a = self.rooms_of(a);
        let entry = self.connections.get(b)?;
        rooms_of_a.into_iter().find(|room| entry.rooms.contains(room))
    }

    /// Records that `id` joined `room`. False when the connection is not registered.
    pub(crate) fn attach_room(&self, id: &ConnectionId, room: &RoomId) -> bool {
        match self.connections.get_mut(id) {
            Some(mut entry) => {
                entry.rooms.insert(room.clone());
                true
            }
            None => false,
        }
    }

    pub(crate) fn detach_room(&self, id: &ConnectionId, room: &RoomId) {
        if let Some(mut entry) = self.connections.get_mut(id) {
            entry.rooms.remove(room);
        }
    }

    /// Queues `msg` on the connection's socket. False when there is no such connection.
    pub fn send(&self, id: &ConnectionId, msg: ServerMessage) -> bool {
        let Some(entry) = self.connections.get(id) else {
            return false;
        };

        if let Err(e) = entry.outbound.send(msg) {
            error!("Failed to queue message for {}: {:?}", id, e.0);
            return false;
        }
        true
    }
}
