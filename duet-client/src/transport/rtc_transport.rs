use crate::config::TransportConfig;
use crate::media::{LocalMedia, LocalTrack};
use crate::transport::{
    ConnectionState, TransportEngine, TransportEvent, TransportEvents, TransportFactory,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use duet_core::{IceCandidate, SdpKind, SessionDescription, TrackKind, TransportFailure};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8, MediaEngine};
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::media::Sample;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_remote::TrackRemote;

/// One Opus frame of silence.
const OPUS_SILENCE: &[u8] = &[0xf8, 0xff, 0xfe];
/// Header of a 16x16 VP8 key frame.
const VP8_BLANK: &[u8] = &[0x10, 0x02, 0x00, 0x9d, 0x01, 0x2a, 0x10, 0x00, 0x10, 0x00];

const AUDIO_FRAME: Duration = Duration::from_millis(20);
const VIDEO_FRAME: Duration = Duration::from_millis(33);

/// Creates a webrtc-rs peer connection per session.
#[derive(Debug, Clone, Default)]
pub struct RtcTransportFactory {
    config: TransportConfig,
}

impl RtcTransportFactory {
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl TransportFactory for RtcTransportFactory {
    async fn create(
        &self,
        media: &LocalMedia,
        events: TransportEvents,
    ) -> Result<Box<dyn TransportEngine>, TransportFailure> {
        let transport = RtcTransport::new(&self.config, media, events)
            .await
            .map_err(|e| TransportFailure::Setup(format!("{:#}", e)))?;
        Ok(Box::new(transport))
    }
}

pub struct RtcTransport {
    generation: u64,
    peer_connection: Arc<RTCPeerConnection>,
    closed: Arc<AtomicBool>,
}

impl RtcTransport {
    pub async fn new(
        config: &TransportConfig,
        media: &LocalMedia,
        events: TransportEvents,
    ) -> Result<Self> {
        let peer_connection = new_peer_connection(config).await?;
        Self::with_peer_connection(peer_connection, media, events).await
    }

    /// Wires callbacks and local tracks into an existing peer connection.
    /// On failure the peer connection is closed before returning.
    pub(crate) async fn with_peer_connection(
        peer_connection: Arc<RTCPeerConnection>,
        media: &LocalMedia,
        events: TransportEvents,
    ) -> Result<Self> {
        let generation = events.generation();
        let closed = Arc::new(AtomicBool::new(false));

        let state_events = events.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let events = state_events.clone();
                Box::pin(async move {
                    info!("Peer connection state changed (session {}): {}", events.generation(), s);
                    events.emit(TransportEvent::ConnectionState(map_state(s)));
                })
            },
        ));

        let ice_events = events.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let events = ice_events.clone();
            Box::pin(async move {
                let candidate = match c {
                    None => None,
                    Some(c) => match c.to_json() {
                        Ok(init) => Some(IceCandidate {
                            candidate: init.candidate,
                            sdp_mid: init.sdp_mid,
                            sdp_m_line_index: init.sdp_mline_index,
                        }),
                        Err(e) => {
                            warn!("Failed to serialize local ICE candidate: {}", e);
                            return;
                        }
                    },
                };
                events.emit(TransportEvent::LocalCandidate(candidate));
            })
        }));

        let track_events = events;
        peer_connection.on_track(Box::new(
            move |track: Arc<TrackRemote>,
                  _receiver: Arc<RTCRtpReceiver>,
                  _transceiver: Arc<RTCRtpTransceiver>| {
                let events = track_events.clone();
                Box::pin(async move {
                    let kind = match track.kind() {
                        RTPCodecType::Audio => TrackKind::Audio,
                        RTPCodecType::Video => TrackKind::Video,
                        other => {
                            debug!("Ignoring remote track of kind {}", other);
                            return;
                        }
                    };
                    let id = track.id().to_string();
                    debug!("Remote {} track {} arrived", kind, id);
                    events.emit(TransportEvent::RemoteTrack { kind, id });
                })
            },
        ));

        let attached = match attach_tracks(&peer_connection, media).await {
            Ok(attached) => attached,
            Err(e) => {
                closed.store(true, Ordering::Release);
                if let Err(close_err) = peer_connection.close().await {
                    warn!(
                        "Failed to close peer connection (session {}): {}",
                        generation, close_err
                    );
                }
                return Err(e);
            }
        };

        for AttachedTrack {
            track,
            sender,
            local,
        } in attached
        {
            // RTCP has to be drained for the interceptors to run.
            tokio::spawn(async move {
                let mut rtcp_buf = vec![0u8; 1500];
                while let Ok((_, _)) = sender.read(&mut rtcp_buf).await {}
            });

            spawn_sample_pump(track, local, Arc::clone(&closed));
        }

        Ok(Self {
            generation,
            peer_connection,
            closed,
        })
    }

    fn to_rtc(desc: SessionDescription) -> Result<RTCSessionDescription> {
        let rtc = match desc.kind {
            SdpKind::Offer => RTCSessionDescription::offer(desc.sdp),
            SdpKind::Answer => RTCSessionDescription::answer(desc.sdp),
        };
        rtc.context("Failed to parse session description")
    }
}

#[async_trait]
impl TransportEngine for RtcTransport {
    async fn create_offer(&self) -> Result<SessionDescription, TransportFailure> {
        let offer = self
            .peer_connection
            .create_offer(None)
            .await
            .map_err(|e| TransportFailure::Description(e.to_string()))?;
        Ok(SessionDescription::offer(offer.sdp))
    }

    async fn create_answer(&self) -> Result<SessionDescription, TransportFailure> {
        let answer = self
            .peer_connection
            .create_answer(None)
            .await
            .map_err(|e| TransportFailure::Description(e.to_string()))?;
        Ok(SessionDescription::answer(answer.sdp))
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), TransportFailure> {
        let rtc = Self::to_rtc(desc).map_err(|e| TransportFailure::Description(format!("{:#}", e)))?;
        self.peer_connection
            .set_local_description(rtc)
            .await
            .map_err(|e| TransportFailure::Description(e.to_string()))
    }

    async fn set_remote_description(
        &self,
        desc: SessionDescription,
    ) -> Result<(), TransportFailure> {
        let rtc = Self::to_rtc(desc).map_err(|e| TransportFailure::Description(format!("{:#}", e)))?;
        self.peer_connection
            .set_remote_description(rtc)
            .await
            .map_err(|e| TransportFailure::Description(e.to_string()))
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), TransportFailure> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_m_line_index,
            username_fragment: None,
        };
        self.peer_connection
            .add_ice_candidate(init)
            .await
            .map_err(|e| TransportFailure::Candidate(e.to_string()))
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Err(e) = self.peer_connection.close().await {
            warn!("Failed to close peer connection (session {}): {}", self.generation, e);
        }
        debug!("Peer connection closed (session {})", self.generation);
    }
}

async fn new_peer_connection(config: &TransportConfig) -> Result<Arc<RTCPeerConnection>> {
    let mut m = MediaEngine::default();
    m.register_default_codecs()?;
    let registry = register_default_interceptors(Registry::new(), &mut m)?;

    let api = APIBuilder::new()
        .with_media_engine(m)
        .with_interceptor_registry(registry)
        .build();

    let rtc_config = RTCConfiguration {
        ice_servers: config
            .ice_servers
            .iter()
            .map(|server| RTCIceServer {
                urls: server.urls.clone(),
                username: server.username.clone().unwrap_or_default(),
                credential: server.credential.clone().unwrap_or_default(),
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    };

    let peer_connection = api
        .new_peer_connection(rtc_config)
        .await
        .context("Failed to create peer connection")?;
    Ok(Arc::new(peer_connection))
}

struct AttachedTrack {
    track: Arc<TrackLocalStaticSample>,
    sender: Arc<RTCRtpSender>,
    local: LocalTrack,
}

/// Adds every local track before any of them starts sending.
async fn attach_tracks(
    peer_connection: &RTCPeerConnection,
    media: &LocalMedia,
) -> Result<Vec<AttachedTrack>> {
    let mut attached = Vec::with_capacity(media.tracks().len());
    for local in media.tracks() {
        let mime_type = match local.kind() {
            TrackKind::Audio => MIME_TYPE_OPUS,
            TrackKind::Video => MIME_TYPE_VP8,
        };
        let track = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: mime_type.to_owned(),
                ..Default::default()
            },
            local.id().to_owned(),
            media.stream_id().to_owned(),
        ));

        let sender = peer_connection
            .add_track(Arc::clone(&track) as Arc<dyn TrackLocal + Send + Sync>)
            .await
            .with_context(|| format!("Failed to add {} track {}", local.kind(), local.id()))?;

        attached.push(AttachedTrack {
            track,
            sender,
            local: local.clone(),
        });
    }
    Ok(attached)
}

fn map_state(s: RTCPeerConnectionState) -> ConnectionState {
    match s {
        RTCPeerConnectionState::Unspecified | RTCPeerConnectionState::New => ConnectionState::New,
        RTCPeerConnectionState::Connecting => ConnectionState::Connecting,
        RTCPeerConnectionState::Connected => ConnectionState::Connected,
        RTCPeerConnectionState::Disconnected => ConnectionState::Disconnected,
        RTCPeerConnectionState::Failed => ConnectionState::Failed,
        RTCPeerConnectionState::Closed => ConnectionState::Closed,
    }
}

/// Feeds placeholder frames into a local track while it is enabled. A
/// disabled track stays negotiated but sends nothing.
fn spawn_sample_pump(
    track: Arc<TrackLocalStaticSample>,
    local: LocalTrack,
    closed: Arc<AtomicBool>,
) {
    let (payload, frame) = match local.kind() {
        TrackKind::Audio => (OPUS_SILENCE, AUDIO_FRAME),
        TrackKind::Video => (VP8_BLANK, VIDEO_FRAME),
    };

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(frame);
        loop {
            ticker.tick().await;
            if closed.load(Ordering::Acquire) {
                break;
            }
            if !local.is_enabled() {
                continue;
            }
            let sample = Sample {
                data: Bytes::from_static(payload),
                duration: frame,
                ..Default::default()
            };
            if let Err(e) = track.write_sample(&sample).await {
                debug!("Stopping {} sample pump for {}: {}", local.kind(), local.id(), e);
                break;
            }
        }
    });
}
