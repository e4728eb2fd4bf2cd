use async_trait::async_trait;
use duet_core::{MemberId, SignalMessage};

/// Delivery side of the relay, implemented by each front-end so the
/// membership actor can reach a specific member.
#[async_trait]
pub trait SignalingOutput: Send + Sync {
    async fn send_signal(&self, member: MemberId, msg: SignalMessage);
}
