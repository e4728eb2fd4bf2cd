use crate::media::{MediaGate, MediaSource};
use crate::negotiation::{NegotiationError, NegotiationResult, PeerSession};
use crate::session::{SessionCommand, SessionHandle, SessionNotice, SessionPhase, SessionSnapshot};
use crate::transport::{ConnectionState, TransportEvent, TransportEvents, TransportFactory};
use duet_core::{
    IceCandidate, PreconditionError, ProtocolViolation, RelayChannel, RelayEvent, RoomFullError,
    RoomId, SessionError, SignalMessage, TransportFailure,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

const COMMAND_CAPACITY: usize = 32;

/// Single owner of everything one participant holds: local media, the
/// membership phase and the current peer session.
///
/// Commands, relay events and transport events are multiplexed in one loop,
/// so no two handlers ever run at the same time.
pub struct SessionController {
    relay: Arc<dyn RelayChannel>,
    relay_rx: mpsc::UnboundedReceiver<RelayEvent>,
    relay_open: bool,
    media_source: Arc<dyn MediaSource>,
    transport_factory: Arc<dyn TransportFactory>,
    command_rx: mpsc::Receiver<SessionCommand>,
    transport_tx: mpsc::UnboundedSender<(u64, TransportEvent)>,
    transport_rx: mpsc::UnboundedReceiver<(u64, TransportEvent)>,
    notice_tx: mpsc::UnboundedSender<SessionNotice>,
    generation: Arc<AtomicU64>,
    phase: SessionPhase,
    gate: MediaGate,
    session: Option<PeerSession>,
}

impl SessionController {
    pub fn new(
        relay: Arc<dyn RelayChannel>,
        relay_rx: mpsc::UnboundedReceiver<RelayEvent>,
        media_source: Arc<dyn MediaSource>,
        transport_factory: Arc<dyn TransportFactory>,
    ) -> (Self, SessionHandle, mpsc::UnboundedReceiver<SessionNotice>) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (transport_tx, transport_rx) = mpsc::unbounded_channel();
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();
        let generation = Arc::new(AtomicU64::new(0));

        let controller = Self {
            relay,
            relay_rx,
            relay_open: true,
            media_source,
            transport_factory,
            command_rx,
            transport_tx,
            transport_rx,
            notice_tx,
            generation: Arc::clone(&generation),
            phase: SessionPhase::Idle,
            gate: MediaGate::default(),
            session: None,
        };
        let handle = SessionHandle::new(command_tx, generation);
        (controller, handle, notice_rx)
    }

    /// Spawns the controller loop.
    pub fn spawn(
        relay: Arc<dyn RelayChannel>,
        relay_rx: mpsc::UnboundedReceiver<RelayEvent>,
        media_source: Arc<dyn MediaSource>,
        transport_factory: Arc<dyn TransportFactory>,
    ) -> (SessionHandle, mpsc::UnboundedReceiver<SessionNotice>) {
        let (controller, handle, notices) =
            Self::new(relay, relay_rx, media_source, transport_factory);
        tokio::spawn(controller.run());
        (handle, notices)
    }

    pub async fn run(mut self) {
        info!("Session controller started");

        loop {
            // Inbound traffic is drained before any command queued after it.
            tokio::select! {
                biased;

                event = self.relay_rx.recv(), if self.relay_open => match event {
                    Some(RelayEvent::Message(msg)) => self.handle_signal(msg).await,
                    Some(RelayEvent::Disconnected) | None => {
                        self.relay_open = false;
                        self.handle_disconnect().await;
                    }
                },
                Some((generation, event)) = self.transport_rx.recv() => {
                    self.handle_transport_event(generation, event).await;
                }
                cmd = self.command_rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    None => break,
                },
            }
        }

        // Every handle is gone; leave quietly.
        if let Some(room_id) = self.phase.room_id().cloned() {
            self.send_signal(SignalMessage::Leave { room_id }).await;
        }
        self.teardown().await;
        info!("All session handles dropped. Session controller finished");
    }

    async fn handle_command(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::Ready { reply } => {
                let _ = reply.send(self.ready().await);
            }
            SessionCommand::Join { room_id, reply } => {
                let _ = reply.send(self.join(room_id).await);
            }
            SessionCommand::Leave { reply } => {
                let _ = reply.send(self.leave().await);
            }
            SessionCommand::SetEnabled {
                kind,
                enabled,
                reply,
            } => {
                let _ = reply.send(self.gate.set_enabled(kind, enabled));
            }
            SessionCommand::ToggleMedia { reply } => {
                let _ = reply.send(self.gate.toggle_all());
            }
            SessionCommand::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            SessionCommand::Reconnect {
                relay,
                relay_rx,
                reply,
            } => {
                self.reconnect(relay, relay_rx).await;
                let _ = reply.send(());
            }
        }
    }

    async fn ready(&mut self) -> Result<(), SessionError> {
        if self.gate.is_ready() {
            debug!("Local media already acquired");
            return Ok(());
        }

        let media = self.media_source.acquire().await.inspect_err(|e| {
            warn!("Failed to acquire local media: {}", e);
        })?;
        for track in media.tracks() {
            info!("Acquired local {} track {}", track.kind(), track.id());
        }

        self.gate.attach(media);
        if self.phase == SessionPhase::Idle {
            self.phase = SessionPhase::Ready;
        }
        self.notify(SessionNotice::Ready);
        Ok(())
    }

    async fn join(&mut self, room_id: RoomId) -> Result<(), SessionError> {
        match &self.phase {
            SessionPhase::Idle => Err(PreconditionError::NotReady.into()),
            SessionPhase::Joining(current) | SessionPhase::InRoom(current) => {
                Err(PreconditionError::AlreadyJoined(current.clone()).into())
            }
            SessionPhase::Ready => {
                self.relay
                    .send(SignalMessage::Join {
                        room_id: room_id.clone(),
                    })
                    .await?;
                info!("Joining room #{}", room_id);
                self.phase = SessionPhase::Joining(room_id);
                Ok(())
            }
        }
    }

    async fn leave(&mut self) -> Result<(), SessionError> {
        let Some(room_id) = self.phase.room_id().cloned() else {
            debug!("Leave requested outside a room, nothing to do");
            return Ok(());
        };

        self.send_signal(SignalMessage::Leave {
            room_id: room_id.clone(),
        })
        .await;
        self.teardown().await;
        self.phase = SessionPhase::Ready;

        info!("Left room #{}", room_id);
        self.notify(SessionNotice::Left { room_id });
        Ok(())
    }

    async fn reconnect(
        &mut self,
        relay: Arc<dyn RelayChannel>,
        relay_rx: mpsc::UnboundedReceiver<RelayEvent>,
    ) {
        if self.phase.room_id().is_some() {
            self.generation.fetch_add(1, Ordering::AcqRel);
            if let Err(e) = self.leave().await {
                warn!("Failed to leave before switching relay: {}", e);
            }
        }

        self.relay = relay;
        self.relay_rx = relay_rx;
        self.relay_open = true;
        info!("Relay channel attached, phase is {}", self.phase);
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase.clone(),
            negotiation: self.session.as_ref().map(|s| s.state()),
            role: self.session.as_ref().map(|s| s.role()),
            pending_candidates: self
                .session
                .as_ref()
                .map_or(0, |s| s.pending_candidate_count()),
        }
    }

    async fn handle_signal(&mut self, msg: SignalMessage) {
        let event = msg.event();
        let Some(current) = self.phase.room_id() else {
            warn!(
                "{}",
                ProtocolViolation::UnexpectedState {
                    event,
                    state: self.phase.to_string(),
                }
            );
            return;
        };
        if msg.room_id() != current {
            warn!(
                "{}",
                ProtocolViolation::WrongRoom {
                    event,
                    expected: current.to_string(),
                    got: msg.room_id().clone(),
                }
            );
            return;
        }

        match msg {
            SignalMessage::Joined { room_id } => self.on_joined(room_id).await,
            SignalMessage::RoomFull {
                room_id,
                member_count,
            } => self.on_room_full(room_id, member_count),
            SignalMessage::PeerJoined { room_id } => self.on_peer_joined(room_id).await,
            SignalMessage::Offer { sdp, .. } => {
                let Some(session) = self.active_session(event) else {
                    return;
                };
                let outcome = session.on_offer(sdp).await;
                self.finish_transition(outcome).await;
            }
            SignalMessage::Answer { sdp, .. } => {
                let Some(session) = self.active_session(event) else {
                    return;
                };
                let outcome = session.on_answer(sdp).await;
                self.finish_transition(outcome).await;
            }
            SignalMessage::Candidate { candidate, .. } => {
                self.on_remote_candidate(candidate).await
            }
            SignalMessage::Left { room_id } => self.on_peer_left(room_id).await,
            SignalMessage::Join { .. } | SignalMessage::Leave { .. } => {
                warn!("{}", ProtocolViolation::WrongDirection { event });
            }
        }
    }

    async fn on_joined(&mut self, room_id: RoomId) {
        if !matches!(self.phase, SessionPhase::Joining(_)) {
            warn!(
                "{}",
                ProtocolViolation::UnexpectedState {
                    event: "joined",
                    state: self.phase.to_string(),
                }
            );
            return;
        }

        info!("Joined room #{}", room_id);
        self.phase = SessionPhase::InRoom(room_id.clone());
        self.notify(SessionNotice::Joined {
            room_id: room_id.clone(),
        });
        self.open_session(room_id).await;
    }

    fn on_room_full(&mut self, room_id: RoomId, member_count: usize) {
        if !matches!(self.phase, SessionPhase::Joining(_)) {
            warn!(
                "{}",
                ProtocolViolation::UnexpectedState {
                    event: "room-full",
                    state: self.phase.to_string(),
                }
            );
            return;
        }

        let err = RoomFullError {
            room_id,
            member_count,
        };
        info!("{}", err);
        self.phase = SessionPhase::Ready;
        self.notify(SessionNotice::RoomFull(err));
    }

    async fn on_peer_joined(&mut self, room_id: RoomId) {
        if self.session.is_none() {
            warn!(
                "{}",
                ProtocolViolation::UnexpectedState {
                    event: "peer-joined",
                    state: self.phase.to_string(),
                }
            );
            return;
        }

        info!("Peer joined room #{}, sending offer", room_id);
        self.notify(SessionNotice::PeerJoined { room_id });
        let Some(session) = self.active_session("peer-joined") else {
            return;
        };
        let outcome = session.on_peer_joined().await;
        self.finish_transition(outcome).await;
    }

    async fn on_remote_candidate(&mut self, candidate: Option<IceCandidate>) {
        let Some(session) = self.active_session("candidate") else {
            return;
        };
        if let Err(e) = session.on_remote_candidate(candidate).await {
            self.finish_transition(Err(e)).await;
        }
    }

    /// The peer is gone but we stay in the room, ready for the next one.
    async fn on_peer_left(&mut self, room_id: RoomId) {
        if !matches!(self.phase, SessionPhase::InRoom(_)) {
            warn!(
                "{}",
                ProtocolViolation::UnexpectedState {
                    event: "left",
                    state: self.phase.to_string(),
                }
            );
            return;
        }

        info!("Peer left room #{}, waiting for a new one", room_id);
        self.notify(SessionNotice::PeerLeft {
            room_id: room_id.clone(),
        });
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.teardown().await;
        self.open_session(room_id).await;
    }

    async fn handle_disconnect(&mut self) {
        warn!("Relay channel disconnected");
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.teardown().await;
        if self.phase.room_id().is_some() {
            self.phase = SessionPhase::Ready;
        }
        self.notify(SessionNotice::Disconnected);
    }

    async fn handle_transport_event(&mut self, generation: u64, event: TransportEvent) {
        let Some(session) = self
            .session
            .as_ref()
            .filter(|s| s.generation() == generation && !s.is_closed())
        else {
            debug!("Dropping {:?} from retired transport {}", event, generation);
            return;
        };

        match event {
            TransportEvent::LocalCandidate(candidate) => {
                let room_id = session.room_id().clone();
                self.send_signal(SignalMessage::Candidate { room_id, candidate })
                    .await;
            }
            TransportEvent::RemoteTrack { kind, id } => {
                info!("Receiving remote {} track {}", kind, id);
                self.notify(SessionNotice::RemoteTrack { kind, id });
            }
            TransportEvent::ConnectionState(state) => {
                self.notify(SessionNotice::ConnectionState(state));
                if state == ConnectionState::Failed {
                    self.fail_session(TransportFailure::ConnectionFailed.into())
                        .await;
                }
            }
        }
    }

    async fn open_session(&mut self, room_id: RoomId) {
        let Some(media) = self.gate.media() else {
            self.fail_session(PreconditionError::NotReady.into()).await;
            return;
        };

        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let events = TransportEvents::new(generation, self.transport_tx.clone());
        match self.transport_factory.create(media, events).await {
            Ok(engine) => {
                debug!("Opened peer session {} in room #{}", generation, room_id);
                self.session = Some(PeerSession::new(
                    room_id,
                    generation,
                    Arc::clone(&self.generation),
                    engine,
                ));
            }
            Err(e) => self.fail_session(e.into()).await,
        }
    }

    async fn finish_transition(&mut self, outcome: NegotiationResult) {
        match outcome {
            Ok(Some(msg)) => self.send_signal(msg).await,
            Ok(None) => {}
            Err(NegotiationError::Violation(violation)) => warn!("{}", violation),
            Err(NegotiationError::Fatal(failure)) => self.fail_session(failure.into()).await,
        }
    }

    /// Tears down like `leave()` and reports the failure once.
    async fn fail_session(&mut self, err: SessionError) {
        error!("Peer session failed: {}", err);
        if let Some(room_id) = self.phase.room_id().cloned() {
            self.send_signal(SignalMessage::Leave { room_id }).await;
        }
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.teardown().await;
        self.phase = if self.gate.is_ready() {
            SessionPhase::Ready
        } else {
            SessionPhase::Idle
        };
        self.notify(SessionNotice::Failed(err));
    }

    async fn teardown(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close().await;
        }
    }

    fn active_session(&mut self, event: &'static str) -> Option<&mut PeerSession> {
        if self.session.is_none() {
            warn!(
                "{}",
                ProtocolViolation::UnexpectedState {
                    event,
                    state: self.phase.to_string(),
                }
            );
        }
        self.session.as_mut()
    }

    async fn send_signal(&self, msg: SignalMessage) {
        let event = msg.event();
        if let Err(e) = self.relay.send(msg).await {
            warn!("Failed to send `{}`: {}", event, e);
        }
    }

    fn notify(&self, notice: SessionNotice) {
        if self.notice_tx.send(notice).is_err() {
            debug!("Notice receiver dropped");
        }
    }
}
