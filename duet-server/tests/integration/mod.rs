
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::Level;

use duet_core::RoomId;
use duet_server::{DEFAULT_QUEUE_CAPACITY, RoomCommand, RoomManager};

use crate::utils::{Delivered, MockSignalingOutput};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn create_test_manager() -> (
    mpsc::Sender<RoomCommand>,
    mpsc::UnboundedReceiver<Delivered>,
    MockSignalingOutput,
) {
    let (signaling, signal_rx) = MockSignalingOutput::new();
    let cmd_tx = RoomManager::spawn(Arc::new(signaling.clone()), DEFAULT_QUEUE_CAPACITY);
    (cmd_tx, signal_rx, signaling)
}

pub fn room(id: &str) -> RoomId {
    RoomId::parse(id).expect("valid room id")
}
