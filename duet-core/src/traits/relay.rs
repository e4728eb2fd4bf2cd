use crate::error::RelayError;
use crate::model::SignalMessage;
use async_trait::async_trait;

/// Outbound half of the relay. Delivery order is preserved per sender.
///
/// The inbound half is an ordered `RelayEvent` stream handed out by the
/// concrete implementation when it is constructed.
#[async_trait]
pub trait RelayChannel: Send + Sync {
    async fn send(&self, msg: SignalMessage) -> Result<(), RelayError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    Message(SignalMessage),
    /// The bus went away. Treated as an implicit leave.
    Disconnected,
}
