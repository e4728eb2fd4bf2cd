use duet_core::{IceCandidate, SignalMessage};

use crate::integration::{init_tracing, room};
use crate::utils::{WsTestClient, start_relay};

#[tokio::test]
async fn test_ws_join_pair_and_room_full() {
    init_tracing();

    let addr = start_relay().await;
    let mut a = WsTestClient::connect(addr).await.expect("connect a");
    let mut b = WsTestClient::connect(addr).await.expect("connect b");
    let mut c = WsTestClient::connect(addr).await.expect("connect c");

    a.send(&SignalMessage::Join { room_id: room("r1") })
        .await
        .unwrap();
    assert_eq!(
        a.recv().await.unwrap(),
        SignalMessage::Joined { room_id: room("r1") }
    );

    b.send(&SignalMessage::Join { room_id: room("r1") })
        .await
        .unwrap();
    assert_eq!(
        b.recv().await.unwrap(),
        SignalMessage::Joined { room_id: room("r1") }
    );
    assert_eq!(
        a.recv().await.unwrap(),
        SignalMessage::PeerJoined { room_id: room("r1") }
    );

    c.send(&SignalMessage::Join { room_id: room("r1") })
        .await
        .unwrap();
    assert_eq!(
        c.recv().await.unwrap(),
        SignalMessage::RoomFull {
            room_id: room("r1"),
            member_count: 2
        }
    );

    let candidate = SignalMessage::Candidate {
        room_id: room("r1"),
        candidate: Some(IceCandidate::new("candidate:1 1 udp 1 127.0.0.1 9 typ host")),
    };
    a.send(&candidate).await.unwrap();
    assert_eq!(b.recv().await.unwrap(), candidate);
    c.expect_silence().await;

    a.close().await.unwrap();
    c.close().await.unwrap();
    b.close().await.unwrap();
}

#[tokio::test]
async fn test_ws_socket_close_notifies_peer() {
    init_tracing();

    let addr = start_relay().await;
    let mut a = WsTestClient::connect(addr).await.expect("connect a");
    let mut b = WsTestClient::connect(addr).await.expect("connect b");

    a.send(&SignalMessage::Join { room_id: room("r1") })
        .await
        .unwrap();
    a.recv().await.unwrap();
    b.send(&SignalMessage::Join { room_id: room("r1") })
        .await
        .unwrap();
    b.recv().await.unwrap();
    a.recv().await.unwrap();

    b.close().await.unwrap();

    assert_eq!(
        a.recv().await.unwrap(),
        SignalMessage::Left { room_id: room("r1") }
    );
}

#[tokio::test]
async fn test_ws_malformed_frames_are_discarded() {
    init_tracing();

    let addr = start_relay().await;
    let mut a = WsTestClient::connect(addr).await.expect("connect a");

    a.send_raw("not json").await.unwrap();
    a.send_raw(r#"{"event":"join","data":{"roomId":""}}"#)
        .await
        .unwrap();
    a.send_raw(r#"{"event":"peer-joined","data":{"roomId":"r1"}}"#)
        .await
        .unwrap();
    a.expect_silence().await;

    // The connection survives and still works.
    a.send(&SignalMessage::Join { room_id: room("r1") })
        .await
        .unwrap();
    assert_eq!(
        a.recv().await.unwrap(),
        SignalMessage::Joined { room_id: room("r1") }
    );
}
