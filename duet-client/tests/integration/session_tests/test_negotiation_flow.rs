use duet_client::{ConnectionState, NegotiationState, Role, SessionNotice, SessionPhase};
use duet_core::{IceCandidate, SignalMessage};

use crate::integration::{ScriptedPeer, init_tracing, room};
use crate::utils::{assert_nothing_sent, next_sent, wait_for_notice, wait_for_sent};

#[tokio::test]
async fn test_initiator_offers_and_forwards_candidates() {
    init_tracing();
    let mut peer = ScriptedPeer::spawn();
    peer.enter_room("r1").await;
    wait_for_sent(&mut peer.sent, "join").await;

    peer.deliver(SignalMessage::PeerJoined { room_id: room("r1") });
    wait_for_notice(&mut peer.notices, |n| {
        matches!(n, SessionNotice::PeerJoined { .. })
    })
    .await;

    let offer = next_sent(&mut peer.sent).await;
    assert!(matches!(offer, SignalMessage::Offer { .. }), "{:?}", offer);

    // Local candidates follow as discovered, including the end marker.
    let SignalMessage::Candidate { candidate, .. } = next_sent(&mut peer.sent).await else {
        panic!("expected a candidate");
    };
    assert!(candidate.is_some());
    assert_eq!(
        next_sent(&mut peer.sent).await,
        SignalMessage::Candidate {
            room_id: room("r1"),
            candidate: None,
        }
    );

    peer.deliver(SignalMessage::Answer {
        room_id: room("r1"),
        sdp: "v=0 answer".into(),
    });
    peer.deliver(SignalMessage::Candidate {
        room_id: room("r1"),
        candidate: Some(IceCandidate::new("candidate:9 1 udp 1 10.0.0.9 9 typ host")),
    });

    let notice = wait_for_notice(&mut peer.notices, |n| {
        matches!(n, SessionNotice::ConnectionState(_))
    })
    .await;
    assert_eq!(notice, SessionNotice::ConnectionState(ConnectionState::Connected));

    let snapshot = peer.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.phase, SessionPhase::InRoom(room("r1")));
    assert_eq!(snapshot.negotiation, Some(NegotiationState::Stable));
    assert_eq!(snapshot.role, Some(Role::Initiator));
}

#[tokio::test]
async fn test_duplicate_offer_gets_single_answer() {
    init_tracing();
    let mut peer = ScriptedPeer::spawn();
    peer.enter_room("r1").await;
    wait_for_sent(&mut peer.sent, "join").await;

    let offer = SignalMessage::Offer {
        room_id: room("r1"),
        sdp: "v=0 offer".into(),
    };
    peer.deliver(offer.clone());
    let answer = next_sent(&mut peer.sent).await;
    assert!(matches!(answer, SignalMessage::Answer { .. }), "{:?}", answer);

    peer.deliver(offer);
    peer.handle.snapshot().await.unwrap();

    assert_eq!(peer.relay.count_event("answer"), 1);
    let snapshot = peer.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.negotiation, Some(NegotiationState::Stable));
    assert_eq!(snapshot.role, Some(Role::Responder));
}

#[tokio::test]
async fn test_early_candidates_are_queued_for_initiator() {
    init_tracing();
    let mut peer = ScriptedPeer::spawn();
    peer.enter_room("r1").await;

    peer.deliver(SignalMessage::PeerJoined { room_id: room("r1") });
    wait_for_sent(&mut peer.sent, "offer").await;

    for i in 0..2 {
        peer.deliver(SignalMessage::Candidate {
            room_id: room("r1"),
            candidate: Some(IceCandidate::new(format!("candidate:{}", i))),
        });
    }
    assert_eq!(peer.handle.snapshot().await.unwrap().pending_candidates, 2);

    peer.deliver(SignalMessage::Answer {
        room_id: room("r1"),
        sdp: "v=0 answer".into(),
    });
    let snapshot = peer.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.pending_candidates, 0);
    assert_eq!(
        peer.transports.latest().applied_candidates(),
        vec!["candidate:0".to_owned(), "candidate:1".to_owned()]
    );
}

#[tokio::test]
async fn test_peer_left_starts_fresh_session() {
    init_tracing();
    let mut peer = ScriptedPeer::spawn();
    peer.enter_room("r1").await;

    peer.deliver(SignalMessage::PeerJoined { room_id: room("r1") });
    wait_for_sent(&mut peer.sent, "offer").await;

    peer.deliver(SignalMessage::Left { room_id: room("r1") });
    let notice = wait_for_notice(&mut peer.notices, |n| {
        matches!(n, SessionNotice::PeerLeft { .. })
    })
    .await;
    assert_eq!(notice, SessionNotice::PeerLeft { room_id: room("r1") });

    let snapshot = peer.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.phase, SessionPhase::InRoom(room("r1")));
    assert_eq!(snapshot.negotiation, Some(NegotiationState::Idle));
    assert_eq!(snapshot.role, Some(Role::Unassigned));
    assert!(peer.transports.engine(0).is_closed());
    assert_eq!(peer.transports.open_engines(), 1);

    // The next arrival is offered to by the fresh session.
    peer.deliver(SignalMessage::PeerJoined { room_id: room("r1") });
    wait_for_sent(&mut peer.sent, "offer").await;
    assert_eq!(peer.relay.count_event("offer"), 2);
    assert_eq!(peer.relay.count_event("leave"), 0);
}

#[tokio::test]
async fn test_unexpected_joined_is_ignored() {
    init_tracing();
    let mut peer = ScriptedPeer::spawn();
    peer.enter_room("r1").await;
    wait_for_sent(&mut peer.sent, "join").await;

    peer.deliver(SignalMessage::Joined { room_id: room("r1") });
    peer.handle.snapshot().await.unwrap();

    assert_eq!(peer.transports.created(), 1);
    assert_nothing_sent(&mut peer.sent).await;
}
