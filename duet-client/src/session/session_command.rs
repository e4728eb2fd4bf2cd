use crate::negotiation::{NegotiationState, Role};
use crate::session::SessionPhase;
use duet_core::{RelayChannel, RelayEvent, RoomId, SessionError, TrackKind};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

pub enum SessionCommand {
    Ready {
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Join {
        room_id: RoomId,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Leave {
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    SetEnabled {
        kind: TrackKind,
        enabled: bool,
        reply: oneshot::Sender<usize>,
    },
    ToggleMedia {
        reply: oneshot::Sender<Option<bool>>,
    },
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    Reconnect {
        relay: Arc<dyn RelayChannel>,
        relay_rx: mpsc::UnboundedReceiver<RelayEvent>,
        reply: oneshot::Sender<()>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub negotiation: Option<NegotiationState>,
    pub role: Option<Role>,
    pub pending_candidates: usize,
}
