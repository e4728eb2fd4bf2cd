use duet_core::TrackKind;

use crate::integration::{ScriptedPeer, init_tracing};
use crate::utils::{assert_nothing_sent, wait_for_sent};

#[tokio::test]
async fn test_toggles_before_ready_are_noops() {
    init_tracing();
    let mut peer = ScriptedPeer::spawn();

    assert_eq!(peer.handle.set_enabled(TrackKind::Audio, false).await, Ok(0));
    assert_eq!(peer.handle.toggle_media().await, Ok(None));
    assert_nothing_sent(&mut peer.sent).await;
}

#[tokio::test]
async fn test_toggles_never_signal() {
    init_tracing();
    let mut peer = ScriptedPeer::spawn();
    peer.enter_room("r1").await;
    wait_for_sent(&mut peer.sent, "join").await;

    assert_eq!(peer.handle.set_enabled(TrackKind::Video, false).await, Ok(1));
    assert_eq!(peer.handle.set_enabled(TrackKind::Audio, false).await, Ok(1));
    assert_eq!(peer.handle.toggle_media().await, Ok(Some(true)));
    assert_eq!(peer.handle.toggle_media().await, Ok(Some(false)));

    assert_nothing_sent(&mut peer.sent).await;
    assert_eq!(peer.relay.sent().len(), 1);
    assert_eq!(peer.transports.created(), 1);
}
