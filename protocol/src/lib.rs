use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// ---- Connections ----
///
/// Handle for one live transport connection. Minted by the server when a
/// socket is accepted; everything the coordinator knows about a connection is
/// keyed by this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnId(Uuid);

impl ConnId {
    pub fn fresh() -> Self {
        ConnId(Uuid::new_v4())
    }
}

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// ---- Roles ----
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Role {
    /// The one member per room allowed to configure blinds/chips and start
    /// the game. The first joiner of an empty room gets it.
    GameMaster,
    Player,
    SmallBlind,
    BigBlind,
}

impl Role {
    pub fn is_game_master(&self) -> bool {
        matches!(self, Role::GameMaster)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::GameMaster => write!(f, "GameMaster"),
            Role::Player => write!(f, "Player"),
            Role::SmallBlind => write!(f, "SmallBlind"),
            Role::BigBlind => write!(f, "BigBlind"),
        }
    }
}

/// ---- Round phases ----
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum RoundPhase {
    #[default]
    None,
    FirstRound,
    NormalRound,
    LastRound,
}

/// ---- Inbound commands ----
///
/// Wire envelope is a JSON object tagged by its `operation` field:
/// `{"operation":"join","gameName":"G1","userName":"Leo"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "camelCase")]
pub enum ClientToServer {
    #[serde(rename_all = "camelCase")]
    Join { game_name: String, user_name: String },
    StartGame,
    SetBigBlind { amount: u64 },
    SetStartingChips { amount: u64 },
    Leave,
}

/// Operation tags the dispatcher routes. Anything else is dropped after a log
/// line, without an acknowledgement.
pub const OPERATIONS: [&str; 5] = [
    "join",
    "startGame",
    "setBigBlind",
    "setStartingChips",
    "leave",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Not a JSON object carrying an `operation` string.
    Malformed,
    /// Well-formed envelope, but the operation tag is not one we route.
    UnknownOperation(String),
    /// Known operation whose payload fields are missing or mistyped.
    BadPayload(String),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Malformed => write!(f, "malformed message"),
            DecodeError::UnknownOperation(op) => write!(f, "unknown operation {op:?}"),
            DecodeError::BadPayload(op) => write!(f, "bad payload for operation {op:?}"),
        }
    }
}

impl std::error::Error for DecodeError {}

impl ClientToServer {
    /// Two-stage decode: read the `operation` tag first, then the payload, so
    /// a known operation with a broken payload can be answered with that
    /// operation's failure acknowledgement instead of a blanket error.
    pub fn decode(raw: &str) -> Result<Self, DecodeError> {
        let value: serde_json::Value =
            serde_json::from_str(raw).map_err(|_| DecodeError::Malformed)?;
        let operation = value
            .get("operation")
            .and_then(serde_json::Value::as_str)
            .ok_or(DecodeError::Malformed)?
            .to_owned();
        match serde_json::from_value(value) {
            Ok(cmd) => Ok(cmd),
            Err(_) if OPERATIONS.contains(&operation.as_str()) => {
                Err(DecodeError::BadPayload(operation))
            }
            Err(_) => Err(DecodeError::UnknownOperation(operation)),
        }
    }
}

/// ---- Acknowledgements ----
///
/// Flat text lines sent back over the requesting connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    JoinSuccess,
    JoinFailed,
    StartGameSuccess,
    StartGameFailed,
    SetBigBlindSuccess,
    SetBigBlindFailed,
    SetStartingChipsSuccess,
    SetStartingChipsFailed,
    LeaveSuccess,
    LeaveFailed,
    Error,
}

impl Ack {
    /// Failure acknowledgement for a decoded operation tag, where one exists.
    pub fn failed_for(operation: &str) -> Option<Ack> {
        match operation {
            "join" => Some(Ack::JoinFailed),
            "startGame" => Some(Ack::StartGameFailed),
            "setBigBlind" => Some(Ack::SetBigBlindFailed),
            "setStartingChips" => Some(Ack::SetStartingChipsFailed),
            "leave" => Some(Ack::LeaveFailed),
            _ => None,
        }
    }
}

impl fmt::Display for Ack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ack::JoinSuccess => write!(f, "joinGame: success"),
            Ack::JoinFailed => write!(f, "joinGame: failed"),
            Ack::StartGameSuccess => write!(f, "startGame: successful"),
            Ack::StartGameFailed => write!(f, "startGame: failed"),
            Ack::SetBigBlindSuccess => write!(f, "setBigBlind: success"),
            Ack::SetBigBlindFailed => write!(f, "setBigBlind: failed"),
            Ack::SetStartingChipsSuccess => write!(f, "setStartingChips: success"),
            Ack::SetStartingChipsFailed => write!(f, "setStartingChips: failed"),
            Ack::LeaveSuccess => write!(f, "leaveGame: success"),
            Ack::LeaveFailed => write!(f, "leaveGame: failed"),
            Ack::Error => write!(f, "error"),
        }
    }
}

/// ---- Snapshots ----
///
/// Serialized room state, sent to the creator when a join brings a new room
/// into existence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub id: String,
    pub users: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServerToClient {
    Ack(Ack),
    Snapshot(RoomSnapshot),
}

impl fmt::Display for ServerToClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerToClient::Ack(ack) => ack.fmt(f),
            ServerToClient::Snapshot(snapshot) => {
                let text = serde_json::to_string(snapshot).map_err(|_| fmt::Error)?;
                f.write_str(&text)
            }
        }
    }
}
