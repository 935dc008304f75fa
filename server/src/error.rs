use thiserror::Error;

/// Failure kinds for coordination operations. Each surfaces as a failure
/// acknowledgement on the requesting connection only; none are fatal to the
/// process, and the registry and rooms stay valid after any of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CoordError {
    #[error("empty or disallowed name")]
    InvalidName,
    #[error("name already taken in this room")]
    DuplicateName,
    #[error("operation requires the game master role")]
    NotPrivileged,
    #[error("no identity bound to this connection")]
    UnknownConnection,
    #[error("message could not be decoded")]
    MalformedMessage,
}
