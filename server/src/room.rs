use std::collections::BTreeMap;

use cardtable_protocol::{ConnId, Role, RoomSnapshot, RoundPhase};
use rand::seq::SliceRandom;
use rand::thread_rng;
use tracing::{debug, info};

use crate::error::CoordError;

// ==== knobs ====
pub const DEFAULT_STARTING_CHIPS: u64 = 1000; // stack each player sits down with
pub const DEFAULT_BIG_BLIND: u64 = 0; // nothing staked until the game master sets it

/// Configuration applied to rooms created on demand.
#[derive(Debug, Clone, Copy)]
pub struct RoomDefaults {
    pub starting_chips: u64,
    pub big_blind: u64,
}

impl Default for RoomDefaults {
    fn default() -> Self {
        RoomDefaults {
            starting_chips: DEFAULT_STARTING_CHIPS,
            big_blind: DEFAULT_BIG_BLIND,
        }
    }
}

/// One occupant of a room. Owned by the room's membership map; `room` is the
/// registry key of the owning room, not a pointer into it, so tearing a room
/// down never has to chase identities.
#[derive(Debug)]
pub struct Identity {
    pub name: String,
    pub role: Role,
    /// Turn slot for the current hand. 0 until turn order is randomized.
    pub turn_order: usize,
    pub room: String,
    pub conn: ConnId,
}

/// What `Room::leave` tells the caller to do next.
#[derive(Debug, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// Last member gone; the caller must drop the room from the registry.
    RoomEmptied,
    /// Members remain; the caller should check for a leaderless room.
    RoomContinues,
}

pub struct Room {
    pub id: String,
    /// Keyed by display name. The ordered map gives turn-order assignment a
    /// consistent iteration order.
    pub members: BTreeMap<String, Identity>,
    pub starting_chips: u64,
    pub big_blind: u64,
    pub small_blind: u64,
    pub round_phase: RoundPhase,
    /// Count of members below the game master, cached by the last turn-order
    /// randomization.
    pub non_privileged_count: usize,
}

impl Room {
    pub fn new(id: String, defaults: RoomDefaults) -> Self {
        Room {
            id,
            members: BTreeMap::new(),
            starting_chips: defaults.starting_chips,
            big_blind: defaults.big_blind,
            small_blind: defaults.big_blind / 2,
            round_phase: RoundPhase::None,
            non_privileged_count: 0,
        }
    }

    /// The first joiner of an empty room becomes the game master; everyone
    /// after that sits down as a plain player. The only path that hands out
    /// the game master role to a fresh joiner.
    pub fn join(&mut self, name: &str, conn: ConnId) -> Result<&Identity, CoordError> {
        if name.is_empty() {
            return Err(CoordError::InvalidName);
        }
        if self.members.contains_key(name) {
            return Err(CoordError::DuplicateName);
        }
        let role = if self.members.is_empty() {
            Role::GameMaster
        } else {
            Role::Player
        };
        info!(room = %self.id, user = %name, %role, "joined");
        let identity = Identity {
            name: name.to_owned(),
            role,
            turn_order: 0,
            room: self.id.clone(),
            conn,
        };
        self.members.insert(name.to_owned(), identity);
        Ok(&self.members[name])
    }

    /// Removes `name` from the membership. Unknown names fall through to the
    /// occupancy check, so calling this twice is harmless.
    pub fn leave(&mut self, name: &str) -> LeaveOutcome {
        if let Some(identity) = self.members.remove(name) {
            debug!(room = %identity.room, user = %identity.name, conn = %identity.conn, "left");
        }
        if self.members.is_empty() {
            LeaveOutcome::RoomEmptied
        } else {
            LeaveOutcome::RoomContinues
        }
    }

    /// Restores the one-game-master rule after the game master is gone:
    /// promotes the first remaining member in map order. No-op while a game
    /// master is present or the room is empty.
    pub fn promote_if_leaderless(&mut self) {
        if self.members.values().any(|m| m.role.is_game_master()) {
            return;
        }
        if let Some(successor) = self.members.values_mut().next() {
            successor.role = Role::GameMaster;
            info!(room = %self.id, user = %successor.name, "promoted to game master");
        }
    }

    /// Game-master-gated. Small blind is always half the big blind.
    pub fn set_big_blind(&mut self, caller: &str, amount: u64) -> bool {
        if !self.caller_is_game_master(caller) {
            return false;
        }
        self.big_blind = amount;
        self.small_blind = amount / 2;
        info!(
            room = %self.id,
            big_blind = self.big_blind,
            small_blind = self.small_blind,
            "blinds configured"
        );
        true
    }

    /// Game-master-gated.
    pub fn set_starting_chips(&mut self, caller: &str, amount: u64) -> bool {
        if !self.caller_is_game_master(caller) {
            return false;
        }
        self.starting_chips = amount;
        info!(room = %self.id, starting_chips = self.starting_chips, "starting chips configured");
        true
    }

    fn caller_is_game_master(&self, caller: &str) -> bool {
        self.members
            .get(caller)
            .map_or(false, |m| m.role.is_game_master())
    }

    /// Deal a fresh hand: back to the first round, then reshuffle the seats.
    pub fn start_hand(&mut self) {
        self.round_phase = RoundPhase::FirstRound;
        self.randomize_turn_order();
    }

    /// Uniform random permutation of turn slots across everyone but the game
    /// master. Slot 0 posts the small blind, slot 1 the big blind, the rest
    /// play. Ends by advancing the hand once.
    pub fn randomize_turn_order(&mut self) {
        let names: Vec<String> = self
            .members
            .values()
            .filter(|m| !m.role.is_game_master())
            .map(|m| m.name.clone())
            .collect();
        self.non_privileged_count = names.len();

        let mut slots: Vec<usize> = (0..names.len()).collect();
        slots.shuffle(&mut thread_rng());

        for (name, slot) in names.iter().zip(slots) {
            if let Some(member) = self.members.get_mut(name) {
                member.turn_order = slot;
                member.role = match slot {
                    0 => Role::SmallBlind,
                    1 => Role::BigBlind,
                    _ => Role::Player,
                };
            }
        }
        debug!(room = %self.id, players = self.non_privileged_count, "turn order randomized");
        self.advance_hand();
    }

    /// Rotate every player's turn slot by one, wrapping once a slot runs past
    /// the table size. A progression placeholder only; this does not model
    /// betting-round completion.
    pub fn advance_hand(&mut self) {
        let wrap_after = self.non_privileged_count;
        for member in self
            .members
            .values_mut()
            .filter(|m| !m.role.is_game_master())
        {
            member.turn_order += 1;
            if member.turn_order > wrap_after {
                member.turn_order = 0;
            }
        }
    }

    /// The one modeled admin transition: first round into normal play. In any
    /// other phase this is a no-op.
    pub fn start_round(&mut self) {
        if self.round_phase == RoundPhase::FirstRound {
            self.round_phase = RoundPhase::NormalRound;
        }
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            id: self.id.clone(),
            users: self.members.keys().cloned().collect(),
        }
    }
}
