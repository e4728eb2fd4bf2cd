use crate::room::{RoomCommand, RoomManager};
use crate::signaling::SignalingOutput;
use async_trait::async_trait;
use dashmap::DashMap;
use duet_core::{MemberId, RelayChannel, RelayError, RelayEvent, SignalMessage};
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// In-process front-end: members are plain channels instead of sockets.
#[derive(Clone, Default)]
pub struct LocalSignaling {
    members: Arc<DashMap<MemberId, mpsc::UnboundedSender<RelayEvent>>>,
}

#[async_trait]
impl SignalingOutput for LocalSignaling {
    async fn send_signal(&self, member: MemberId, msg: SignalMessage) {
        let Some(conn) = self.members.get(&member) else {
            warn!(
                "Attempted to send `{}` to disconnected member {}",
                msg.event(),
                member
            );
            return;
        };
        if conn.send(RelayEvent::Message(msg)).is_err() {
            debug!("Local member {} dropped its receiver", member);
        }
    }
}

/// A relay with its own membership actor, reachable without a network.
#[derive(Clone)]
pub struct LocalRelayHub {
    signaling: LocalSignaling,
    room_cmd_tx: mpsc::Sender<RoomCommand>,
}

impl LocalRelayHub {
    pub fn spawn(capacity: NonZeroUsize) -> Self {
        let signaling = LocalSignaling::default();
        let room_cmd_tx = RoomManager::spawn(Arc::new(signaling.clone()), capacity);
        Self {
            signaling,
            room_cmd_tx,
        }
    }

    /// Opens a new member connection and its ordered inbound stream.
    pub fn connect(&self) -> (LocalRelay, mpsc::UnboundedReceiver<RelayEvent>) {
        let member = MemberId::new();
        let (tx, rx) = mpsc::unbounded_channel();
        self.signaling.members.insert(member, tx);

        let relay = LocalRelay {
            member,
            signaling: self.signaling.clone(),
            room_cmd_tx: self.room_cmd_tx.clone(),
        };
        (relay, rx)
    }
}

#[derive(Clone)]
pub struct LocalRelay {
    member: MemberId,
    signaling: LocalSignaling,
    room_cmd_tx: mpsc::Sender<RoomCommand>,
}

impl LocalRelay {
    pub fn member(&self) -> MemberId {
        self.member
    }

    /// Simulates the connection dropping: the hub forgets the member and
    /// its inbound stream receives `Disconnected`.
    pub async fn disconnect(&self) {
        if let Some((_, conn)) = self.signaling.members.remove(&self.member) {
            let _ = conn.send(RelayEvent::Disconnected);
        }
        let _ = self
            .room_cmd_tx
            .send(RoomCommand::Disconnect {
                member: self.member,
            })
            .await;
    }
}

#[async_trait]
impl RelayChannel for LocalRelay {
    async fn send(&self, msg: SignalMessage) -> Result<(), RelayError> {
        if !self.signaling.members.contains_key(&self.member) {
            return Err(RelayError::Closed);
        }
        let cmd = match RoomCommand::from_signal(self.member, msg) {
            Ok(cmd) => cmd,
            Err(violation) => {
                warn!("Discarding message from {}: {}", self.member, violation);
                return Ok(());
            }
        };
        self.room_cmd_tx
            .send(cmd)
            .await
            .map_err(|_| RelayError::Closed)
    }
}
