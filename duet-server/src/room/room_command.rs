use duet_core::{MemberId, ProtocolViolation, RoomId, SignalMessage};

/// Commands fed into the membership actor by the relay front-ends.
#[derive(Debug)]
pub enum RoomCommand {
    Join { member: MemberId, room_id: RoomId },

    Leave { member: MemberId, room_id: RoomId },

    /// Offer, answer or candidate to forward to the other member.
    Relay { member: MemberId, message: SignalMessage },

    /// The member's relay connection is gone.
    Disconnect { member: MemberId },
}

impl RoomCommand {
    /// Maps a message received from a client onto a command.
    pub fn from_signal(member: MemberId, message: SignalMessage) -> Result<Self, ProtocolViolation> {
        match message {
            SignalMessage::Join { room_id } => Ok(RoomCommand::Join { member, room_id }),
            SignalMessage::Leave { room_id } => Ok(RoomCommand::Leave { member, room_id }),
            SignalMessage::Offer { .. }
            | SignalMessage::Answer { .. }
            | SignalMessage::Candidate { .. } => Ok(RoomCommand::Relay { member, message }),
            other => Err(ProtocolViolation::WrongDirection {
                event: other.event(),
            }),
        }
    }
}
