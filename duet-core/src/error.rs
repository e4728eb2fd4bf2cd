use crate::model::RoomId;
use thiserror::Error;

/// Media acquisition failed. Retryable by the user.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeviceError {
    #[error("media device access denied: {0}")]
    Denied(String),
    #[error("media device unavailable: {0}")]
    Unavailable(String),
}

/// Rejected synchronously, no state change.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PreconditionError {
    #[error("room id must not be empty")]
    EmptyRoomId,
    #[error("media is not ready, call ready() first")]
    NotReady,
    #[error("already in room #{0}")]
    AlreadyJoined(RoomId),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("room #{room_id} is full ({member_count} members)")]
pub struct RoomFullError {
    pub room_id: RoomId,
    pub member_count: usize,
}

/// Malformed, out-of-order or duplicate signaling. Logged and discarded.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProtocolViolation {
    #[error("malformed signal message: {0}")]
    Malformed(String),
    #[error("`{event}` is missing `{field}`")]
    EmptyField {
        event: &'static str,
        field: &'static str,
    },
    #[error("`{event}` is not valid in this direction")]
    WrongDirection { event: &'static str },
    #[error("`{event}` received in state {state}")]
    UnexpectedState { event: &'static str, state: String },
    #[error("`{event}` for room #{got}, expected #{expected}")]
    WrongRoom {
        event: &'static str,
        expected: String,
        got: RoomId,
    },
    #[error("`{event}` from a member outside room #{room_id}")]
    NotAMember { event: &'static str, room_id: RoomId },
}

/// The transport engine failed or could not produce/apply a description.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportFailure {
    #[error("failed to create transport: {0}")]
    Setup(String),
    #[error("session description rejected: {0}")]
    Description(String),
    #[error("ice candidate rejected: {0}")]
    Candidate(String),
    #[error("connection failed")]
    ConnectionFailed,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RelayError {
    #[error("relay channel closed")]
    Closed,
    #[error("failed to encode signal message: {0}")]
    Encode(String),
    #[error("relay connection failed: {0}")]
    Connect(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error(transparent)]
    Precondition(#[from] PreconditionError),
    #[error(transparent)]
    RoomFull(#[from] RoomFullError),
    #[error(transparent)]
    Protocol(#[from] ProtocolViolation),
    #[error(transparent)]
    Transport(#[from] TransportFailure),
    #[error(transparent)]
    Relay(#[from] RelayError),
    #[error("session controller has shut down")]
    ControllerGone,
}
