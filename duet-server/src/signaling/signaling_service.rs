use crate::room::RoomCommand;
use crate::signaling::SignalingOutput;
use async_trait::async_trait;
use axum::extract::ws::Message;
use dashmap::DashMap;
use duet_core::{MemberId, SignalMessage};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, warn};

struct SignalingInner {
    members: DashMap<MemberId, mpsc::UnboundedSender<Message>>,
}

/// WebSocket front-end of the relay: one outbound queue per connection.
#[derive(Clone)]
pub struct SignalingService {
    inner: Arc<SignalingInner>,
    pub(crate) room_cmd_tx: mpsc::Sender<RoomCommand>,
}

impl SignalingService {
    pub fn new(room_cmd_tx: mpsc::Sender<RoomCommand>) -> Self {
        Self {
            inner: Arc::new(SignalingInner {
                members: DashMap::new(),
            }),
            room_cmd_tx,
        }
    }

    pub fn add_member(&self, member: MemberId, tx: mpsc::UnboundedSender<Message>) {
        self.inner.members.insert(member, tx);
    }

    pub fn remove_member(&self, member: &MemberId) {
        self.inner.members.remove(member);
    }

    pub fn connected_members(&self) -> usize {
        self.inner.members.len()
    }
}

#[async_trait]
impl SignalingOutput for SignalingService {
    async fn send_signal(&self, member: MemberId, msg: SignalMessage) {
        let Some(conn) = self.inner.members.get(&member) else {
            warn!(
                "Attempted to send `{}` to disconnected member {}",
                msg.event(),
                member
            );
            return;
        };
        match msg.encode() {
            Ok(json) => {
                if let Err(e) = conn.send(Message::Text(json.into())) {
                    error!("Failed to send WS message to {}: {:?}", member, e);
                }
            }
            Err(e) => error!("Failed to serialize signal message: {}", e),
        }
    }
}
