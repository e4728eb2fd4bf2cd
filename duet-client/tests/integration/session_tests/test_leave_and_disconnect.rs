use std::sync::Arc;
use std::time::Duration;

use duet_client::{SessionNotice, SessionPhase, SyntheticMediaSource};
use duet_core::{RelayError, RelayEvent, SessionError, SignalMessage};
use tokio::sync::mpsc;

use crate::integration::{ScriptedPeer, init_tracing, room};
use crate::utils::{
    FakeTransportFactory, RecordingRelay, assert_nothing_sent, next_sent, wait_for_notice,
    wait_for_sent,
};

#[tokio::test]
async fn test_leave_releases_engine_and_allows_rejoin() {
    init_tracing();
    let mut peer = ScriptedPeer::spawn();
    peer.enter_room("r1").await;
    wait_for_sent(&mut peer.sent, "join").await;

    peer.handle.leave().await.unwrap();
    assert_eq!(
        next_sent(&mut peer.sent).await,
        SignalMessage::Leave { room_id: room("r1") }
    );
    let notice = wait_for_notice(&mut peer.notices, |n| {
        matches!(n, SessionNotice::Left { .. })
    })
    .await;
    assert_eq!(notice, SessionNotice::Left { room_id: room("r1") });

    assert_eq!(peer.transports.open_engines(), 0);
    let snapshot = peer.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.phase, SessionPhase::Ready);
    assert_eq!(snapshot.negotiation, None);

    // Same room again starts from scratch.
    peer.enter_room("r1").await;
    assert_eq!(peer.transports.created(), 2);
    assert_eq!(peer.transports.open_engines(), 1);
}

#[tokio::test]
async fn test_leave_outside_room_is_noop() {
    init_tracing();
    let mut peer = ScriptedPeer::spawn();

    peer.handle.leave().await.unwrap();
    peer.handle.ready().await.unwrap();
    peer.handle.leave().await.unwrap();

    assert_nothing_sent(&mut peer.sent).await;
    crate::utils::assert_no_notice(&mut peer.notices, |n| {
        matches!(n, SessionNotice::Left { .. })
    })
    .await;
}

#[tokio::test]
async fn test_leave_while_joining_sends_leave() {
    init_tracing();
    let mut peer = ScriptedPeer::spawn();
    peer.handle.ready().await.unwrap();
    peer.handle.join("r1").await.unwrap();
    wait_for_sent(&mut peer.sent, "join").await;

    peer.handle.leave().await.unwrap();
    wait_for_sent(&mut peer.sent, "leave").await;

    // The relay's late confirmation must not resurrect a session.
    peer.deliver(SignalMessage::Joined { room_id: room("r1") });
    let snapshot = peer.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.phase, SessionPhase::Ready);
    assert_eq!(peer.transports.created(), 0);
}

#[tokio::test]
async fn test_leave_abandons_offer_in_flight() {
    init_tracing();
    let mut peer = ScriptedPeer::spawn_with(
        SyntheticMediaSource::new(),
        FakeTransportFactory::with_delay(Duration::from_millis(300)),
    );
    peer.enter_room("r1").await;
    wait_for_sent(&mut peer.sent, "join").await;

    peer.deliver(SignalMessage::PeerJoined { room_id: room("r1") });
    wait_for_notice(&mut peer.notices, |n| {
        matches!(n, SessionNotice::PeerJoined { .. })
    })
    .await;

    // The controller is now inside `create_offer`.
    peer.handle.leave().await.unwrap();

    assert_eq!(
        next_sent(&mut peer.sent).await,
        SignalMessage::Leave { room_id: room("r1") }
    );
    assert_nothing_sent(&mut peer.sent).await;
    assert_eq!(peer.relay.count_event("offer"), 0);
    assert_eq!(peer.relay.count_event("candidate"), 0);
    assert!(peer.transports.engine(0).is_closed());
}

#[tokio::test]
async fn test_relay_disconnect_acts_as_leave() {
    init_tracing();
    let mut peer = ScriptedPeer::spawn();
    peer.enter_room("r1").await;

    peer.inbound.send(RelayEvent::Disconnected).unwrap();
    wait_for_notice(&mut peer.notices, |n| *n == SessionNotice::Disconnected).await;

    assert_eq!(peer.transports.open_engines(), 0);
    let snapshot = peer.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.phase, SessionPhase::Ready);
    assert_eq!(snapshot.negotiation, None);
    assert_eq!(
        peer.handle.join("r1").await,
        Err(SessionError::Relay(RelayError::Closed))
    );

    // A fresh relay connection makes `join` work again.
    let (relay, mut sent) = RecordingRelay::new();
    let (inbound, relay_rx) = mpsc::unbounded_channel();
    peer.handle
        .reconnect(Arc::new(relay), relay_rx)
        .await
        .unwrap();

    peer.handle.join("r1").await.unwrap();
    assert_eq!(
        next_sent(&mut sent).await,
        SignalMessage::Join { room_id: room("r1") }
    );
    inbound
        .send(RelayEvent::Message(SignalMessage::Joined { room_id: room("r1") }))
        .unwrap();
    wait_for_notice(&mut peer.notices, |n| {
        matches!(n, SessionNotice::Joined { .. })
    })
    .await;
    assert_eq!(
        peer.handle.phase().await.unwrap(),
        SessionPhase::InRoom(room("r1"))
    );
    assert_eq!(peer.transports.open_engines(), 1);
}

#[tokio::test]
async fn test_reconnect_while_in_room_leaves_old_relay() {
    init_tracing();
    let mut peer = ScriptedPeer::spawn();
    peer.enter_room("r1").await;
    wait_for_sent(&mut peer.sent, "join").await;

    let (relay, mut sent) = RecordingRelay::new();
    let (_inbound, relay_rx) = mpsc::unbounded_channel();
    peer.handle
        .reconnect(Arc::new(relay), relay_rx)
        .await
        .unwrap();

    assert_eq!(
        next_sent(&mut peer.sent).await,
        SignalMessage::Leave { room_id: room("r1") }
    );
    wait_for_notice(&mut peer.notices, |n| {
        matches!(n, SessionNotice::Left { .. })
    })
    .await;
    assert_nothing_sent(&mut sent).await;
    assert_eq!(peer.transports.open_engines(), 0);
    assert_eq!(peer.handle.phase().await.unwrap(), SessionPhase::Ready);
}
