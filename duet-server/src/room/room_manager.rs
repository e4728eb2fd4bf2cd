use crate::room::{Admission, Room, RoomCommand};
use crate::signaling::SignalingOutput;
use duet_core::{MemberId, ProtocolViolation, RoomId, SignalMessage};
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Membership actor. Owns every room; all joins, leaves and relayed
/// messages are serialized through its command queue.
pub struct RoomManager {
    rooms: HashMap<RoomId, Room>,
    memberships: HashMap<MemberId, RoomId>,
    command_rx: mpsc::Receiver<RoomCommand>,
    signaling: Arc<dyn SignalingOutput>,
}

impl RoomManager {
    pub fn new(command_rx: mpsc::Receiver<RoomCommand>, signaling: Arc<dyn SignalingOutput>) -> Self {
        Self {
            rooms: HashMap::new(),
            memberships: HashMap::new(),
            command_rx,
            signaling,
        }
    }

    /// Spawns the actor and returns its command sender.
    pub fn spawn(
        signaling: Arc<dyn SignalingOutput>,
        capacity: NonZeroUsize,
    ) -> mpsc::Sender<RoomCommand> {
        let (tx, rx) = mpsc::channel(capacity.get());
        tokio::spawn(Self::new(rx, signaling).run());
        tx
    }

    pub async fn run(mut self) {
        info!("Room manager event loop started");

        while let Some(cmd) = self.command_rx.recv().await {
            self.handle_command(cmd).await;
        }

        info!("Command channel closed. Room manager finished");
    }

    pub fn room(&self, room_id: &RoomId) -> Option<&Room> {
        self.rooms.get(room_id)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub async fn handle_command(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Join { member, room_id } => self.join(member, room_id).await,
            RoomCommand::Leave { member, room_id } => {
                if self.memberships.get(&member) != Some(&room_id) {
                    warn!(
                        "{}",
                        ProtocolViolation::NotAMember {
                            event: "leave",
                            room_id,
                        }
                    );
                    return;
                }
                self.leave(member).await;
            }
            RoomCommand::Relay { member, message } => self.relay(member, message).await,
            RoomCommand::Disconnect { member } => {
                debug!("Member {} disconnected", member);
                self.leave(member).await;
            }
        }
    }

    async fn join(&mut self, member: MemberId, room_id: RoomId) {
        if let Some(current) = self.memberships.get(&member) {
            if *current == room_id {
                warn!("Member {} re-sent join for room #{}, ignoring", member, room_id);
                return;
            }
            info!("Member {} moves from room #{} to #{}", member, current, room_id);
            self.leave(member).await;
        }

        let room = self.rooms.entry(room_id.clone()).or_insert_with(|| {
            info!("Creating new room: #{}", room_id);
            Room::new(room_id.clone())
        });

        match room.admit(member) {
            Admission::First => {
                self.memberships.insert(member, room_id.clone());
                info!("Member {} joined room #{} and waits for a peer", member, room_id);
                self.signaling
                    .send_signal(member, SignalMessage::Joined { room_id })
                    .await;
            }
            Admission::Second { existing } => {
                self.memberships.insert(member, room_id.clone());
                info!(
                    "Member {} joined room #{}; {} will initiate",
                    member, room_id, existing
                );
                self.signaling
                    .send_signal(
                        member,
                        SignalMessage::Joined {
                            room_id: room_id.clone(),
                        },
                    )
                    .await;
                self.signaling
                    .send_signal(existing, SignalMessage::PeerJoined { room_id })
                    .await;
            }
            Admission::Full { member_count } => {
                info!("Room #{} is full, rejecting {}", room_id, member);
                self.signaling
                    .send_signal(
                        member,
                        SignalMessage::RoomFull {
                            room_id,
                            member_count,
                        },
                    )
                    .await;
            }
            Admission::AlreadyMember => {
                warn!("Member {} already in room #{}", member, room_id);
            }
        }
    }

    async fn leave(&mut self, member: MemberId) {
        let Some(room_id) = self.memberships.remove(&member) else {
            return;
        };
        let Some(room) = self.rooms.get_mut(&room_id) else {
            return;
        };

        room.remove(&member);
        info!("Member {} left room #{}", member, room_id);

        if room.is_empty() {
            info!(
                "Room #{} is empty, closing after {:?}",
                room_id,
                room.created_at().elapsed()
            );
            self.rooms.remove(&room_id);
            return;
        }

        let remaining: Vec<MemberId> = room.members().to_vec();
        for other in remaining {
            self.signaling
                .send_signal(
                    other,
                    SignalMessage::Left {
                        room_id: room_id.clone(),
                    },
                )
                .await;
        }
    }

    async fn relay(&mut self, member: MemberId, message: SignalMessage) {
        let event = message.event();
        let room_id = message.room_id();

        let peer = self
            .rooms
            .get(room_id)
            .filter(|room| room.contains(&member))
            .map(|room| room.peer_of(&member));

        match peer {
            None => warn!(
                "{}",
                ProtocolViolation::NotAMember {
                    event,
                    room_id: room_id.clone(),
                }
            ),
            Some(None) => {
                debug!("Dropping `{}` from {}: no peer in room #{}", event, member, room_id)
            }
            Some(Some(peer)) => {
                debug!("Relaying `{}` from {} to {}", event, member, peer);
                self.signaling.send_signal(peer, message).await;
            }
        }
    }
}
