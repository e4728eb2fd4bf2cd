use async_trait::async_trait;
use duet_client::{
    ConnectionState, LocalMedia, TransportEngine, TransportEvent, TransportEvents, TransportFactory,
};
use duet_core::{IceCandidate, SdpKind, SessionDescription, TransportFailure};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Remote descriptions containing this marker are rejected.
pub const MALFORMED_SDP: &str = "v=0 malformed";

/// Remote candidates containing this marker are rejected.
pub const BOGUS_CANDIDATE: &str = "bogus";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineOp {
    CreateOffer,
    CreateAnswer,
    SetLocal(SdpKind),
    SetRemote(SdpKind),
    AddCandidate(String),
    Close,
}

#[derive(Default)]
struct FakeState {
    local_set: bool,
    remote_set: bool,
    applied_candidates: usize,
    connected: bool,
}

/// Test-side view of one engine the factory created.
#[derive(Clone)]
pub struct FakeEngineProbe {
    ops: Arc<Mutex<Vec<EngineOp>>>,
    events: TransportEvents,
    closed: Arc<AtomicBool>,
}

impl FakeEngineProbe {
    pub fn ops(&self) -> Vec<EngineOp> {
        self.ops.lock().unwrap().clone()
    }

    pub fn applied_candidates(&self) -> Vec<String> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                EngineOp::AddCandidate(c) => Some(c),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, op: &EngineOp) -> usize {
        self.ops().iter().filter(|o| *o == op).count()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn generation(&self) -> u64 {
        self.events.generation()
    }

    /// Raises an event as if the engine produced it.
    pub fn emit(&self, event: TransportEvent) {
        self.events.emit(event);
    }
}

/// Scriptable transport. Each `set_local_description` discovers one host
/// candidate followed by the end-of-candidates marker; the engine reports
/// `connected` once both descriptions are set and a remote candidate landed.
#[derive(Clone, Default)]
pub struct FakeTransportFactory {
    engines: Arc<Mutex<Vec<FakeEngineProbe>>>,
    op_delay: Option<Duration>,
}

impl FakeTransportFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every description operation sleeps first.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            op_delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn engines(&self) -> Vec<FakeEngineProbe> {
        self.engines.lock().unwrap().clone()
    }

    pub fn created(&self) -> usize {
        self.engines.lock().unwrap().len()
    }

    pub fn open_engines(&self) -> usize {
        self.engines().iter().filter(|e| !e.is_closed()).count()
    }

    pub fn engine(&self, index: usize) -> FakeEngineProbe {
        self.engines()
            .get(index)
            .cloned()
            .unwrap_or_else(|| panic!("No engine #{} was created", index))
    }

    pub fn latest(&self) -> FakeEngineProbe {
        self.engines()
            .last()
            .cloned()
            .expect("No engine was created")
    }
}

#[async_trait]
impl TransportFactory for FakeTransportFactory {
    async fn create(
        &self,
        media: &LocalMedia,
        events: TransportEvents,
    ) -> Result<Box<dyn TransportEngine>, TransportFailure> {
        assert!(!media.tracks().is_empty(), "transport created without tracks");

        let probe = FakeEngineProbe {
            ops: Arc::new(Mutex::new(Vec::new())),
            events,
            closed: Arc::new(AtomicBool::new(false)),
        };
        self.engines.lock().unwrap().push(probe.clone());

        Ok(Box::new(FakeTransport {
            probe,
            state: Mutex::new(FakeState::default()),
            op_delay: self.op_delay,
        }))
    }
}

pub struct FakeTransport {
    probe: FakeEngineProbe,
    state: Mutex<FakeState>,
    op_delay: Option<Duration>,
}

impl FakeTransport {
    fn record(&self, op: EngineOp) {
        self.probe.ops.lock().unwrap().push(op);
    }

    async fn pause(&self) {
        if let Some(delay) = self.op_delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn maybe_connect(&self) {
        let mut state = self.state.lock().unwrap();
        if state.connected || !state.local_set || !state.remote_set || state.applied_candidates == 0
        {
            return;
        }
        state.connected = true;
        drop(state);
        self.probe
            .emit(TransportEvent::ConnectionState(ConnectionState::Connected));
    }
}

#[async_trait]
impl TransportEngine for FakeTransport {
    async fn create_offer(&self) -> Result<SessionDescription, TransportFailure> {
        self.pause().await;
        self.record(EngineOp::CreateOffer);
        Ok(SessionDescription::offer(format!(
            "v=0 fake-offer {}",
            self.probe.generation()
        )))
    }

    async fn create_answer(&self) -> Result<SessionDescription, TransportFailure> {
        self.pause().await;
        self.record(EngineOp::CreateAnswer);
        Ok(SessionDescription::answer(format!(
            "v=0 fake-answer {}",
            self.probe.generation()
        )))
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), TransportFailure> {
        self.record(EngineOp::SetLocal(desc.kind));
        self.state.lock().unwrap().local_set = true;

        let host = format!(
            "candidate:{} 1 udp 2122252543 127.0.0.1 9 typ host",
            self.probe.generation()
        );
        self.probe
            .emit(TransportEvent::LocalCandidate(Some(IceCandidate {
                candidate: host,
                sdp_mid: Some("0".into()),
                sdp_m_line_index: Some(0),
            })));
        self.probe.emit(TransportEvent::LocalCandidate(None));

        self.maybe_connect();
        Ok(())
    }

    async fn set_remote_description(
        &self,
        desc: SessionDescription,
    ) -> Result<(), TransportFailure> {
        self.pause().await;
        if desc.sdp.contains(MALFORMED_SDP) {
            return Err(TransportFailure::Description("unparseable sdp".into()));
        }
        self.record(EngineOp::SetRemote(desc.kind));
        self.state.lock().unwrap().remote_set = true;
        self.maybe_connect();
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), TransportFailure> {
        if candidate.candidate.contains(BOGUS_CANDIDATE) {
            return Err(TransportFailure::Candidate(candidate.candidate));
        }
        self.record(EngineOp::AddCandidate(candidate.candidate));
        self.state.lock().unwrap().applied_candidates += 1;
        self.maybe_connect();
        Ok(())
    }

    async fn close(&self) {
        if self.probe.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.record(EngineOp::Close);
        self.probe
            .emit(TransportEvent::ConnectionState(ConnectionState::Closed));
    }
}
