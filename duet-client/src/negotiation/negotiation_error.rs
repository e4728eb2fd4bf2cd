use duet_core::{ProtocolViolation, TransportFailure};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NegotiationError {
    /// Logged and discarded; the session carries on.
    #[error(transparent)]
    Violation(#[from] ProtocolViolation),
    /// The session has been closed.
    #[error(transparent)]
    Fatal(#[from] TransportFailure),
}
