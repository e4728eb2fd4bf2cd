use crate::error::ProtocolViolation;
use crate::model::room::RoomId;
use serde::{Deserialize, Serialize};

/// ICE candidate descriptor as carried by the `candidate` event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(default)]
    pub sdp_mid: Option<String>,
    #[serde(default)]
    pub sdp_m_line_index: Option<u16>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_m_line_index: None,
        }
    }

    /// A null descriptor or an empty candidate line marks the end of gathering.
    pub fn is_end_of_candidates(candidate: Option<&IceCandidate>) -> bool {
        candidate.is_none_or(|c| c.candidate.trim().is_empty())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SdpKind {
    Offer,
    Answer,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionDescription {
    pub kind: SdpKind,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Answer,
            sdp: sdp.into(),
        }
    }
}

/// Every control message exchanged through the relay.
///
/// Serialized as `{"event": "peer-joined", "data": {"roomId": "r1"}}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum SignalMessage {
    Join {
        room_id: RoomId,
    },
    Joined {
        room_id: RoomId,
    },
    PeerJoined {
        room_id: RoomId,
    },
    RoomFull {
        room_id: RoomId,
        member_count: usize,
    },
    Offer {
        room_id: RoomId,
        sdp: String,
    },
    Answer {
        room_id: RoomId,
        sdp: String,
    },
    Candidate {
        room_id: RoomId,
        #[serde(default)]
        candidate: Option<IceCandidate>,
    },
    Leave {
        room_id: RoomId,
    },
    Left {
        room_id: RoomId,
    },
}

impl SignalMessage {
    pub fn room_id(&self) -> &RoomId {
        match self {
            SignalMessage::Join { room_id }
            | SignalMessage::Joined { room_id }
            | SignalMessage::PeerJoined { room_id }
            | SignalMessage::RoomFull { room_id, .. }
            | SignalMessage::Offer { room_id, .. }
            | SignalMessage::Answer { room_id, .. }
            | SignalMessage::Candidate { room_id, .. }
            | SignalMessage::Leave { room_id }
            | SignalMessage::Left { room_id } => room_id,
        }
    }

    /// Wire name of the event.
    pub fn event(&self) -> &'static str {
        match self {
            SignalMessage::Join { .. } => "join",
            SignalMessage::Joined { .. } => "joined",
            SignalMessage::PeerJoined { .. } => "peer-joined",
            SignalMessage::RoomFull { .. } => "room-full",
            SignalMessage::Offer { .. } => "offer",
            SignalMessage::Answer { .. } => "answer",
            SignalMessage::Candidate { .. } => "candidate",
            SignalMessage::Leave { .. } => "leave",
            SignalMessage::Left { .. } => "left",
        }
    }

    /// Whether a client may send this message to the relay.
    pub fn is_client_originated(&self) -> bool {
        matches!(
            self,
            SignalMessage::Join { .. }
                | SignalMessage::Offer { .. }
                | SignalMessage::Answer { .. }
                | SignalMessage::Candidate { .. }
                | SignalMessage::Leave { .. }
        )
    }

    /// Whether the relay may deliver this message to a client.
    pub fn is_relay_originated(&self) -> bool {
        !matches!(
            self,
            SignalMessage::Join { .. } | SignalMessage::Leave { .. }
        )
    }

    /// Parses and validates one wire frame.
    pub fn decode(text: &str) -> Result<Self, ProtocolViolation> {
        let msg: SignalMessage = serde_json::from_str(text)
            .map_err(|e| ProtocolViolation::Malformed(e.to_string()))?;
        msg.validate()?;
        Ok(msg)
    }

    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn validate(&self) -> Result<(), ProtocolViolation> {
        if self.room_id().is_empty() {
            return Err(ProtocolViolation::EmptyField {
                event: self.event(),
                field: "roomId",
            });
        }
        match self {
            SignalMessage::Offer { sdp, .. } | SignalMessage::Answer { sdp, .. }
                if sdp.trim().is_empty() =>
            {
                Err(ProtocolViolation::EmptyField {
                    event: self.event(),
                    field: "sdp",
                })
            }
            _ => Ok(()),
        }
    }
}
