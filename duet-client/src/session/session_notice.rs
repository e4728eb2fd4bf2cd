use crate::transport::ConnectionState;
use duet_core::{RoomFullError, RoomId, SessionError, TrackKind};

/// Things the user should see, in the order they happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionNotice {
    Ready,
    Joined { room_id: RoomId },
    /// A second member arrived; we are about to offer.
    PeerJoined { room_id: RoomId },
    RoomFull(RoomFullError),
    /// The peer left; a fresh session waits for the next one.
    PeerLeft { room_id: RoomId },
    RemoteTrack { kind: TrackKind, id: String },
    ConnectionState(ConnectionState),
    Left { room_id: RoomId },
    /// The relay connection is gone.
    Disconnected,
    Failed(SessionError),
}
