use cardtable_protocol::{Ack, ClientToServer, ConnId, DecodeError, ServerToClient};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::CoordError;
use crate::registry::{Binding, ConnectionDirectory, RoomRegistry};
use crate::room::{LeaveOutcome, RoomDefaults};

/// One live socket: its handle plus the outbound channel the shell pumps
/// into the transport.
#[derive(Clone)]
pub struct Connection {
    pub id: ConnId,
    pub tx: mpsc::UnboundedSender<ServerToClient>,
}

impl Connection {
    pub fn open(tx: mpsc::UnboundedSender<ServerToClient>) -> Self {
        Connection {
            id: ConnId::fresh(),
            tx,
        }
    }
}

/// The session & room coordination engine. Owns the registry and the
/// connection directory behind a single lock; message handling and disconnect
/// cleanup serialize on it, which is what keeps the one-game-master-per-room
/// rule intact when joins and disconnects race.
pub struct Coordinator {
    pub(crate) state: Mutex<CoordState>,
}

pub(crate) struct CoordState {
    pub(crate) rooms: RoomRegistry,
    pub(crate) connections: ConnectionDirectory,
}

impl Coordinator {
    pub fn new(defaults: RoomDefaults) -> Self {
        Coordinator {
            state: Mutex::new(CoordState {
                rooms: RoomRegistry::new(defaults),
                connections: ConnectionDirectory::new(),
            }),
        }
    }

    /// Drop every room and binding. Sockets outlive this only as transports;
    /// their next command fails like any other unbound one.
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        info!(
            rooms = state.rooms.len(),
            connections = state.connections.len(),
            "coordinator shutdown"
        );
        state.rooms.clear();
        state.connections.clear();
    }

    /// Decode one inbound frame and route it. Returns the acknowledgement to
    /// send back over the same connection, or `None` when the frame warrants
    /// silence.
    pub fn handle_message(&self, conn: &Connection, raw: &str) -> Option<Ack> {
        let cmd = match ClientToServer::decode(raw) {
            Ok(cmd) => cmd,
            Err(DecodeError::UnknownOperation(op)) => {
                debug!(conn = %conn.id, operation = %op, "unrecognized operation dropped");
                return None;
            }
            Err(DecodeError::BadPayload(op)) => {
                warn!(conn = %conn.id, operation = %op, "payload rejected");
                return Ack::failed_for(&op);
            }
            Err(DecodeError::Malformed) => {
                warn!(conn = %conn.id, error = %CoordError::MalformedMessage, "frame rejected");
                return Some(Ack::Error);
            }
        };

        let mut state = self.state.lock();
        let ack = match cmd {
            ClientToServer::Join {
                game_name,
                user_name,
            } => match state.join(conn, &game_name, &user_name) {
                Ok(()) => Ack::JoinSuccess,
                Err(e) => {
                    warn!(conn = %conn.id, room = %game_name, user = %user_name, error = %e, "join refused");
                    Ack::JoinFailed
                }
            },
            ClientToServer::StartGame => match state.start_game(conn.id) {
                Ok(()) => Ack::StartGameSuccess,
                Err(e) => {
                    warn!(conn = %conn.id, error = %e, "start refused");
                    Ack::StartGameFailed
                }
            },
            ClientToServer::SetBigBlind { amount } => match state.set_big_blind(conn.id, amount) {
                Ok(()) => Ack::SetBigBlindSuccess,
                Err(e) => {
                    warn!(conn = %conn.id, error = %e, "big blind refused");
                    Ack::SetBigBlindFailed
                }
            },
            ClientToServer::SetStartingChips { amount } => {
                match state.set_starting_chips(conn.id, amount) {
                    Ok(()) => Ack::SetStartingChipsSuccess,
                    Err(e) => {
                        warn!(conn = %conn.id, error = %e, "starting chips refused");
                        Ack::SetStartingChipsFailed
                    }
                }
            }
            ClientToServer::Leave => match state.leave(conn.id) {
                Ok(()) => Ack::LeaveSuccess,
                Err(e) => {
                    warn!(conn = %conn.id, error = %e, "leave refused");
                    Ack::LeaveFailed
                }
            },
        };
        Some(ack)
    }

    /// Transport-level disconnect. Runs the same removal sequence as an
    /// explicit leave, then unbinds unconditionally. Safe for connections
    /// that never joined anything, and runs exactly once per socket.
    pub fn handle_disconnect(&self, conn: ConnId) {
        let mut state = self.state.lock();
        match state.depart(conn) {
            Ok(()) => info!(%conn, "disconnect cleaned up"),
            Err(_) => debug!(%conn, "disconnect with no bound identity"),
        }
        state.connections.unbind(conn);
    }
}

impl CoordState {
    fn join(
        &mut self,
        conn: &Connection,
        game_name: &str,
        user_name: &str,
    ) -> Result<(), CoordError> {
        if user_name.is_empty() {
            return Err(CoordError::InvalidName);
        }
        // A bound connection joining again is switching rooms: run the normal
        // departure for its current identity first.
        if self.connections.lookup(conn.id).is_some() {
            let _ = self.depart(conn.id);
            self.connections.unbind(conn.id);
        }

        let created = !self.rooms.contains(game_name);
        let result = self.rooms.ensure_room(game_name).and_then(|room| {
            room.join(user_name, conn.id)?;
            Ok(room.snapshot())
        });
        let snapshot = match result {
            Ok(snapshot) => snapshot,
            Err(e) => {
                if created {
                    self.rooms.remove(game_name);
                }
                return Err(e);
            }
        };

        self.connections.bind(conn.id, game_name, user_name);
        if created {
            let _ = conn.tx.send(ServerToClient::Snapshot(snapshot));
        }
        Ok(())
    }

    fn start_game(&mut self, conn: ConnId) -> Result<(), CoordError> {
        let binding = self.resolve(conn)?;
        let room = self
            .rooms
            .get_mut(&binding.room)
            .ok_or(CoordError::UnknownConnection)?;
        let caller = room
            .members
            .get(&binding.name)
            .ok_or(CoordError::UnknownConnection)?;
        if !caller.role.is_game_master() {
            return Err(CoordError::NotPrivileged);
        }
        room.start_hand();
        room.start_round();
        info!(room = %binding.room, phase = ?room.round_phase, "game started");
        Ok(())
    }

    fn set_big_blind(&mut self, conn: ConnId, amount: u64) -> Result<(), CoordError> {
        let binding = self.resolve(conn)?;
        let room = self
            .rooms
            .get_mut(&binding.room)
            .ok_or(CoordError::UnknownConnection)?;
        // The gate inside the setter may refuse the change; the reply stays
        // positive either way. Deliberate, see DESIGN.md.
        let _changed = room.set_big_blind(&binding.name, amount);
        Ok(())
    }

    fn set_starting_chips(&mut self, conn: ConnId, amount: u64) -> Result<(), CoordError> {
        let binding = self.resolve(conn)?;
        let room = self
            .rooms
            .get_mut(&binding.room)
            .ok_or(CoordError::UnknownConnection)?;
        // Same lenient acknowledgement as set_big_blind.
        let _changed = room.set_starting_chips(&binding.name, amount);
        Ok(())
    }

    /// Explicit leave: departure plus unbind.
    fn leave(&mut self, conn: ConnId) -> Result<(), CoordError> {
        self.depart(conn)?;
        self.connections.unbind(conn);
        Ok(())
    }

    /// Remove the bound identity from its room, destroying the room when it
    /// empties and re-seating a game master when it does not. Leaves the
    /// binding itself to the caller.
    fn depart(&mut self, conn: ConnId) -> Result<(), CoordError> {
        let binding = self.resolve(conn)?;
        let emptied = match self.rooms.get_mut(&binding.room) {
            Some(room) => match room.leave(&binding.name) {
                LeaveOutcome::RoomEmptied => true,
                LeaveOutcome::RoomContinues => {
                    room.promote_if_leaderless();
                    false
                }
            },
            None => false,
        };
        if emptied {
            self.rooms.remove(&binding.room);
        }
        Ok(())
    }

    fn resolve(&self, conn: ConnId) -> Result<Binding, CoordError> {
        self.connections
            .lookup(conn)
            .cloned()
            .ok_or(CoordError::UnknownConnection)
    }
}
