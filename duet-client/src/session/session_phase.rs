use duet_core::RoomId;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPhase {
    /// No local media yet.
    Idle,
    /// Media held, not in a room.
    Ready,
    /// `join` sent, waiting for the relay.
    Joining(RoomId),
    InRoom(RoomId),
}

impl SessionPhase {
    pub fn room_id(&self) -> Option<&RoomId> {
        match self {
            SessionPhase::Joining(room_id) | SessionPhase::InRoom(room_id) => Some(room_id),
            SessionPhase::Idle | SessionPhase::Ready => None,
        }
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionPhase::Idle => f.write_str("idle"),
            SessionPhase::Ready => f.write_str("ready"),
            SessionPhase::Joining(room_id) => write!(f, "joining #{}", room_id),
            SessionPhase::InRoom(room_id) => write!(f, "in-room #{}", room_id),
        }
    }
}
