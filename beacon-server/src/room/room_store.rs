use beacon_core::{ConnectionId, RoomId, SignalEnvelope};
use dashmap::DashMap;
use futures::future::join_all;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, warn};

use crate::registry::ConnectionRegistry;
use crate::room::{Room, RoomCommand};
use crate::signaling::SignalRouter;
use crate::RelayError;

const ROOM_QUEUE_CAPACITY: usize = 100;
const MAX_JOIN_ATTEMPTS: usize = 3;

/// Entry in the room table: the actor's inbox plus the epoch it was created with.
#[derive(Clone)]
pub struct RoomHandle {
    pub(crate) sender: mpsc::Sender<RoomCommand>,
    pub(crate) epoch: u64,
}

pub(crate) type RoomTable = Arc<DashMap<RoomId, RoomHandle>>;

/// Maps room ids to running room actors.
#[derive(Clone)]
pub struct RoomStore {
    rooms: RoomTable,
    next_epoch: Arc<AtomicU64>,
    registry: ConnectionRegistry,
    router: SignalRouter,
}

impl RoomStore {
    pub fn new(registry: ConnectionRegistry, router: SignalRouter) -> Self {
        Self {
            rooms: Arc::new(DashMap::new()),
            next_epoch: Arc::new(AtomicU64::new(0)),
            registry,
            router,
        }
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn contains(&self, room_id: &RoomId) -> bool {
        self.rooms.contains_key(room_id)
    }

    /// Adds `conn_id` to the room, creating the room if needed.
    /// Returns the members that were already there.
    pub async fn join_room(
        &self,
        room_id: &RoomId,
        conn_id: ConnectionId,
    ) -> Result<Vec<ConnectionId>, RelayError> {
        for _ in 0..MAX_JOIN_ATTEMPTS {
            let handle = self.handle_or_create(room_id);
            let (reply, rx) = oneshot::channel();

            if handle
                .sender
                .send(RoomCommand::Join { conn_id, reply })
                .await
                .is_err()
            {
                // Retired between lookup and send.
                self.forget(room_id, handle.epoch);
                continue;
            }

            match rx.await {
                Ok(Err(RelayError::RoomClosed(_))) => continue,
                Ok(result) => return result,
                Err(_) => {
                    error!(room = %room_id, "Room actor dropped a join without answering");
                    self.forget(room_id, handle.epoch);
                }
            }
        }

        error!(room = %room_id, "Giving up joining {} after {} attempts", conn_id, MAX_JOIN_ATTEMPTS);
        Err(RelayError::RoomUnavailable(room_id.clone()))
    }

    /// Removes `conn_id` from the room. Returns whether it was a member.
    pub async fn leave_room(&self, room_id: &RoomId, conn_id: ConnectionId) -> bool {
        self.request(room_id, move |reply| RoomCommand::Leave { conn_id, reply })
            .await
            .unwrap_or(false)
    }

    /// Forwards an envelope through `room_id`. Returns whether it was delivered.
    pub async fn relay(&self, room_id: &RoomId, envelope: SignalEnvelope) -> bool {
        self.request(room_id, move |reply| RoomCommand::Relay { envelope, reply })
            .await
            .unwrap_or(false)
    }

    pub async fn members(&self, room_id: &RoomId) -> Option<Vec<ConnectionId>> {
        self.request(room_id, move |reply| RoomCommand::Members { reply })
            .await
    }

    /// Retires every empty room older than `max_age`. Returns how many went.
    pub async fn sweep_inactive(&self, max_age: Duration) -> usize {
        let room_ids: Vec<RoomId> = self.rooms.iter().map(|entry| entry.key().clone()).collect();

        let results = join_all(room_ids.iter().map(|room_id| {
            self.request(room_id, move |reply| RoomCommand::Sweep { max_age, reply })
        }))
        .await;

        results.into_iter().filter(|swept| *swept == Some(true)).count()
    }

    fn handle_or_create(&self, room_id: &RoomId) -> RoomHandle {
        self.rooms
            .entry(room_id.clone())
            .or_insert_with(|| self.spawn_room(room_id))
            .clone()
    }

    fn spawn_room(&self, room_id: &RoomId) -> RoomHandle {
        let epoch = self.next_epoch.fetch_add(1, Ordering::Relaxed);
        let (sender, command_rx) = mpsc::channel(ROOM_QUEUE_CAPACITY);

        let room = Room::new(
            room_id.clone(),
            epoch,
            command_rx,
            self.rooms.clone(),
            self.registry.clone(),
            self.router.clone(),
        );
        tokio::spawn(room.run());

        RoomHandle { sender, epoch }
    }

    fn forget(&self, room_id: &RoomId, epoch: u64) {
        self.rooms.remove_if(room_id, |_, handle| handle.epoch == epoch);
    }

    /// Sends a command to an existing room and waits for its answer.
    /// `None` when the room does not exist or stopped before answering.
    async fn request<T>(
        &self,
        room_id: &RoomId,
        build: impl FnOnce(oneshot::Sender<T>) -> RoomCommand,
    ) -> Option<T> {
        let handle = self.rooms.get(room_id).map(|entry| entry.clone())?;
        let (reply, rx) = oneshot::channel();

        if handle.sender.send(build(reply)).await.is_err() {
            return None;
        }

        match rx.await {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(room = %room_id, "Room stopped before answering");
                None
            }
        }
    }
}
