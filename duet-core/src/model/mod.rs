mod media;
mod member;
mod room;
mod signaling;

pub use media::TrackKind;
pub use member::MemberId;
pub use room::RoomId;
pub use signaling::{IceCandidate, SdpKind, SessionDescription, SignalMessage};
