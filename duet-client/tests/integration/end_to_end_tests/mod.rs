
use duet_client::{ConnectionState, SessionNotice};

use crate::integration::HubPeer;
use crate::utils::wait_for_notice;

pub async fn wait_connected(peer: &mut HubPeer) {
    wait_for_notice(&mut peer.notices, |n| {
        *n == SessionNotice::ConnectionState(ConnectionState::Connected)
    })
    .await;
}
