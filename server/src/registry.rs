use std::collections::HashMap;

use cardtable_protocol::ConnId;
use tracing::{debug, info};

use crate::error::CoordError;
use crate::room::{Room, RoomDefaults};

/// Process-wide name → room map. The only place rooms come into existence or
/// get torn down.
pub struct RoomRegistry {
    rooms: HashMap<String, Room>,
    defaults: RoomDefaults,
}

impl RoomRegistry {
    pub fn new(defaults: RoomDefaults) -> Self {
        RoomRegistry {
            rooms: HashMap::new(),
            defaults,
        }
    }

    /// Returns the named room, creating it with default configuration the
    /// first time the name shows up. Disallowed names never create anything.
    pub fn ensure_room(&mut self, name: &str) -> Result<&mut Room, CoordError> {
        if !room_name_allowed(name) {
            return Err(CoordError::InvalidName);
        }
        let defaults = self.defaults;
        Ok(self.rooms.entry(name.to_owned()).or_insert_with(|| {
            info!(room = %name, "room created");
            Room::new(name.to_owned(), defaults)
        }))
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Room> {
        self.rooms.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.rooms.contains_key(name)
    }

    /// Idempotent: removing an unknown name is a no-op.
    pub fn remove(&mut self, name: &str) {
        if self.rooms.remove(name).is_some() {
            info!(room = %name, "room destroyed");
        }
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn clear(&mut self) {
        self.rooms.clear();
    }
}

/// Room names: anything but the empty string. Extension point for a
/// blocklist.
pub fn room_name_allowed(name: &str) -> bool {
    match name {
        "" => false,
        _ => true,
    }
}

/// Where a connection's identity lives: room key plus member name.
#[derive(Debug, Clone)]
pub struct Binding {
    pub room: String,
    pub name: String,
}

/// Live connection → joined identity map. Consulted for every command after
/// the initial join, and drives cleanup when the transport drops.
pub struct ConnectionDirectory {
    bindings: HashMap<ConnId, Binding>,
}

impl ConnectionDirectory {
    pub fn new() -> Self {
        ConnectionDirectory {
            bindings: HashMap::new(),
        }
    }

    pub fn bind(&mut self, conn: ConnId, room: &str, name: &str) {
        self.bindings.insert(
            conn,
            Binding {
                room: room.to_owned(),
                name: name.to_owned(),
            },
        );
    }

    pub fn lookup(&self, conn: ConnId) -> Option<&Binding> {
        self.bindings.get(&conn)
    }

    /// Idempotent: unbinding an unknown connection is a no-op.
    pub fn unbind(&mut self, conn: ConnId) {
        if self.bindings.remove(&conn).is_some() {
            debug!(%conn, "connection unbound");
        }
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn clear(&mut self) {
        self.bindings.clear();
    }
}
