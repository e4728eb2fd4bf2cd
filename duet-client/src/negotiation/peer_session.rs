use crate::negotiation::{NegotiationError, NegotiationState, Role};
use crate::transport::TransportEngine;
use duet_core::{
    IceCandidate, ProtocolViolation, RoomId, SessionDescription, SignalMessage, TransportFailure,
};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

/// Outgoing message produced by a transition, if any.
pub type NegotiationResult = Result<Option<SignalMessage>, NegotiationError>;

/// One negotiation with the current peer of a room.
///
/// The session owns its transport engine. Every engine call is a suspension
/// point; afterwards the session compares its generation with the shared
/// counter and drops the result if the session has been abandoned meanwhile.
pub struct PeerSession {
    room_id: RoomId,
    generation: u64,
    current_generation: Arc<AtomicU64>,
    role: Role,
    state: NegotiationState,
    engine: Option<Box<dyn TransportEngine>>,
    remote_description_set: bool,
    pending_candidates: VecDeque<IceCandidate>,
}

impl PeerSession {
    pub fn new(
        room_id: RoomId,
        generation: u64,
        current_generation: Arc<AtomicU64>,
        engine: Box<dyn TransportEngine>,
    ) -> Self {
        Self {
            room_id,
            generation,
            current_generation,
            role: Role::Unassigned,
            state: NegotiationState::Idle,
            engine: Some(engine),
            remote_description_set: false,
            pending_candidates: VecDeque::new(),
        }
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn state(&self) -> NegotiationState {
        self.state
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_closed(&self) -> bool {
        self.state == NegotiationState::Closed
    }

    pub fn has_remote_description(&self) -> bool {
        self.remote_description_set
    }

    pub fn pending_candidate_count(&self) -> usize {
        self.pending_candidates.len()
    }

    /// The peer arrived after us: we offer.
    pub async fn on_peer_joined(&mut self) -> NegotiationResult {
        let outcome = self.start_offer().await;
        self.conclude(outcome).await
    }

    pub async fn on_offer(&mut self, sdp: String) -> NegotiationResult {
        let outcome = self.answer_offer(sdp).await;
        self.conclude(outcome).await
    }

    pub async fn on_answer(&mut self, sdp: String) -> NegotiationResult {
        let outcome = self.accept_answer(sdp).await;
        self.conclude(outcome).await
    }

    /// Applies, queues or drops one remote candidate. A candidate the engine
    /// rejects does not end the session.
    pub async fn on_remote_candidate(
        &mut self,
        candidate: Option<IceCandidate>,
    ) -> Result<(), NegotiationError> {
        let Some(candidate) = candidate.filter(|c| !IceCandidate::is_end_of_candidates(Some(c)))
        else {
            debug!("Remote peer finished gathering candidates");
            return Ok(());
        };

        match self.state {
            NegotiationState::Closed => {
                debug!("Discarding stale candidate for closed session {}", self.generation);
                return Ok(());
            }
            NegotiationState::Idle => return Err(self.unexpected("candidate")),
            _ => {}
        }

        if !self.remote_description_set {
            self.pending_candidates.push_back(candidate);
            debug!(
                "Queued remote candidate until the remote description is set ({} pending)",
                self.pending_candidates.len()
            );
            return Ok(());
        }

        self.apply_candidate(candidate).await;
        Ok(())
    }

    /// Moves to `closed` and releases the engine. Idempotent.
    pub async fn close(&mut self) {
        if self.state != NegotiationState::Closed {
            info!(
                "Closing peer session {} in room #{} (was {})",
                self.generation, self.room_id, self.state
            );
        }
        self.state = NegotiationState::Closed;
        self.pending_candidates.clear();
        if let Some(engine) = self.engine.take() {
            engine.close().await;
        }
    }

    async fn start_offer(&mut self) -> NegotiationResult {
        if self.state != NegotiationState::Idle || self.role != Role::Unassigned {
            return Err(self.unexpected("peer-joined"));
        }
        self.role = Role::Initiator;

        let result = self.engine()?.create_offer().await;
        let Some(offer) = self.settle("create offer", result)? else {
            return Ok(None);
        };
        let result = self.engine()?.set_local_description(offer.clone()).await;
        if self.settle("set local offer", result)?.is_none() {
            return Ok(None);
        }

        self.state = NegotiationState::HaveLocalOffer;
        debug!("Session {} sent its offer", self.generation);
        Ok(Some(SignalMessage::Offer {
            room_id: self.room_id.clone(),
            sdp: offer.sdp,
        }))
    }

    async fn answer_offer(&mut self, sdp: String) -> NegotiationResult {
        if self.state != NegotiationState::Idle {
            return Err(self.unexpected("offer"));
        }
        self.role = Role::Responder;

        let result = self
            .engine()?
            .set_remote_description(SessionDescription::offer(sdp))
            .await;
        if self.settle("set remote offer", result)?.is_none() {
            return Ok(None);
        }
        self.remote_description_set = true;
        self.state = NegotiationState::HaveRemoteOffer;
        self.flush_pending_candidates().await;

        let result = self.engine()?.create_answer().await;
        let Some(answer) = self.settle("create answer", result)? else {
            return Ok(None);
        };
        let result = self.engine()?.set_local_description(answer.clone()).await;
        if self.settle("set local answer", result)?.is_none() {
            return Ok(None);
        }

        self.state = NegotiationState::Stable;
        debug!("Session {} answered the offer", self.generation);
        Ok(Some(SignalMessage::Answer {
            room_id: self.room_id.clone(),
            sdp: answer.sdp,
        }))
    }

    async fn accept_answer(&mut self, sdp: String) -> NegotiationResult {
        if self.state != NegotiationState::HaveLocalOffer {
            return Err(self.unexpected("answer"));
        }

        let result = self
            .engine()?
            .set_remote_description(SessionDescription::answer(sdp))
            .await;
        if self.settle("set remote answer", result)?.is_none() {
            return Ok(None);
        }
        self.remote_description_set = true;
        self.state = NegotiationState::Stable;
        self.flush_pending_candidates().await;
        Ok(None)
    }

    async fn flush_pending_candidates(&mut self) {
        if !self.pending_candidates.is_empty() {
            debug!(
                "Replaying {} queued remote candidates",
                self.pending_candidates.len()
            );
        }
        while let Some(candidate) = self.pending_candidates.pop_front() {
            if self.is_stale() {
                return;
            }
            self.apply_candidate(candidate).await;
        }
    }

    async fn apply_candidate(&mut self, candidate: IceCandidate) {
        let Some(engine) = self.engine.as_deref() else {
            return;
        };
        if let Err(e) = engine.add_ice_candidate(candidate).await {
            warn!("Session {}: {}", self.generation, e);
        }
    }

    /// Fatal failures close the session before they are reported.
    async fn conclude(&mut self, outcome: NegotiationResult) -> NegotiationResult {
        if let Err(NegotiationError::Fatal(_)) = &outcome {
            self.close().await;
        }
        outcome
    }

    /// `Ok(None)` when the session was abandoned while the engine worked.
    fn settle<T>(
        &self,
        op: &str,
        result: Result<T, TransportFailure>,
    ) -> Result<Option<T>, NegotiationError> {
        if self.is_stale() {
            debug!("Discarding `{}` result of abandoned session {}", op, self.generation);
            return Ok(None);
        }
        result.map(Some).map_err(NegotiationError::Fatal)
    }

    fn is_stale(&self) -> bool {
        self.current_generation.load(Ordering::Acquire) != self.generation
    }

    fn engine(&self) -> Result<&dyn TransportEngine, NegotiationError> {
        self.engine
            .as_deref()
            .ok_or_else(|| self.unexpected("engine call"))
    }

    fn unexpected(&self, event: &'static str) -> NegotiationError {
        NegotiationError::Violation(ProtocolViolation::UnexpectedState {
            event,
            state: self.state.to_string(),
        })
    }
}
