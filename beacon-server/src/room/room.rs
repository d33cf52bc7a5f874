use beacon_core::{ConnectionId, RoomId};
use std::collections::HashSet;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::registry::ConnectionRegistry;
use crate::room::room_command::RoomCommand;
use crate::room::room_store::RoomTable;
use crate::signaling::SignalRouter;
use crate::RelayError;

/// Room actor.
/// Owns the membership set; every join, leave, relay and sweep for this room
/// goes through its command queue, so they never interleave.
pub struct Room {
    id: RoomId,

    /// Distinguishes this actor from a later room that reuses the same id.
    epoch: u64,

    members: HashSet<ConnectionId>,
    created_at: Instant,

    command_rx: mpsc::Receiver<RoomCommand>,

    /// Shared room table; the actor removes its own entry when it retires.
    table: RoomTable,

    registry: ConnectionRegistry,
    router: SignalRouter,

    retired: bool,
}

impl Room {
    pub(crate) fn new(
        id: RoomId,
        epoch: u64,
        command_rx: mpsc::Receiver<RoomCommand>,
        table: RoomTable,
        registry: ConnectionRegistry,
        router: SignalRouter,
    ) -> Self {
        Self {
            id,
            epoch,
            members: HashSet::new(),
            created_at: Instant::now(),
            command_rx,
            table,
            registry,
            router,
            retired: false,
        }
    }

    /// Runs the event loop until the room retires.
    /// Must be spawned with `tokio::spawn`.
    pub async fn run(mut self) {
        info!(room = %self.id, "Room created");

        while let Some(cmd) = self.command_rx.recv().await {
            if self.retired {
                self.reject(cmd);
            } else {
                self.handle_command(cmd);
            }
        }

        debug!(room = %self.id, "Room event loop finished");
    }

    fn handle_command(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Join { conn_id, reply } => {
                let _ = reply.send(self.join(conn_id));
            }

            RoomCommand::Leave { conn_id, reply } => {
                let _ = reply.send(self.leave(conn_id));
            }

            RoomCommand::Relay { envelope, reply } => {
                let delivered = if self.members.contains(&envelope.from)
                    && self.members.contains(&envelope.to)
                {
                    self.router.route(envelope)
                } else {
                    warn!(
                        room = %self.id,
                        from = %envelope.from,
                        to = %envelope.to,
                        "Dropping {}: sender or target is not in the room",
                        envelope.kind.event()
                    );
                    false
                };
                let _ = reply.send(delivered);
            }

            RoomCommand::Sweep { max_age, reply } => {
                let expired = self.members.is_empty() && self.created_at.elapsed() > max_age;
                if expired {
                    self.retire("inactive");
                }
                let _ = reply.send(expired);
            }

            RoomCommand::Members { reply } => {
                let _ = reply.send(self.members.iter().copied().collect());
            }
        }
    }

    fn join(&mut self, conn_id: ConnectionId) -> Result<Vec<ConnectionId>, RelayError> {
        self.prune_departed();

        if !self.registry.attach_room(&conn_id, &self.id) {
            warn!(room = %self.id, "Join from unregistered connection {}", conn_id);
            if self.members.is_empty() {
                self.retire("joiner already gone");
            }
            return Err(RelayError::ConnectionNotFound(conn_id));
        }

        let peers: Vec<ConnectionId> = self
            .members
            .iter()
            .filter(|member| **member != conn_id)
            .copied()
            .collect();

        let is_new = self.members.insert(conn_id);

        self.router.send_participants(conn_id, peers.clone());

        if is_new {
            self.router.broadcast_join(&self.id, &peers, conn_id);
            info!(
                room = %self.id,
                participants = self.members.len(),
                "User {} joined room",
                conn_id
            );
        } else {
            debug!(room = %self.id, "User {} re-sent join", conn_id);
        }

        Ok(peers)
    }

    /// Drops members whose connection is already unregistered but whose
    /// `Leave` has not reached this room yet, announcing each departure.
    /// Their own `Leave` then finds nothing to do.
    fn prune_departed(&mut self) {
        let departed: Vec<ConnectionId> = self
            .members
            .iter()
            .filter(|member| !self.registry.is_registered(member))
            .copied()
            .collect();

        for conn_id in departed {
            self.remove_member(conn_id);
        }
    }

    fn leave(&mut self, conn_id: ConnectionId) -> bool {
        if !self.members.contains(&conn_id) {
            return false;
        }

        self.remove_member(conn_id);

        if self.members.is_empty() {
            self.retire("no participants left");
        }
        true
    }

    fn remove_member(&mut self, conn_id: ConnectionId) {
        self.members.remove(&conn_id);
        self.registry.detach_room(&conn_id, &self.id);

        let remaining: Vec<ConnectionId> = self.members.iter().copied().collect();
        self.router.broadcast_leave(&self.id, &remaining, conn_id);
        info!(
            room = %self.id,
            participants = remaining.len(),
            "User {} left room",
            conn_id
        );
    }

    /// Unpublishes the room and stops accepting new commands. Whatever is
    /// already queued is answered by [`Room::reject`].
    fn retire(&mut self, reason: &str) {
        let epoch = self.epoch;
        self.table.remove_if(&self.id, |_, handle| handle.epoch == epoch);
        self.command_rx.close();
        self.retired = true;
        info!(room = %self.id, "Room removed - {}", reason);
    }

    fn reject(&self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Join { reply, .. } => {
                let _ = reply.send(Err(RelayError::RoomClosed(self.id.clone())));
            }
            RoomCommand::Leave { reply, .. } => {
                let _ = reply.send(false);
            }
            RoomCommand::Relay { envelope, reply } => {
                warn!(
                    room = %self.id,
                    "Dropping {} from {}: room closed",
                    envelope.kind.event(),
                    envelope.from
                );
                let _ = reply.send(false);
            }
            RoomCommand::Sweep { reply, .. } => {
                let _ = reply.send(false);
            }
            RoomCommand::Members { reply } => {
                let _ = reply.send(Vec::new());
            }
        }
    }
}
