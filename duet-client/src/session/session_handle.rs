use crate::session::{SessionCommand, SessionPhase, SessionSnapshot};
use duet_core::{RelayChannel, RelayEvent, RoomId, SessionError, TrackKind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, oneshot};

/// Clonable front of a [`SessionController`](crate::SessionController).
#[derive(Clone)]
pub struct SessionHandle {
    command_tx: mpsc::Sender<SessionCommand>,
    generation: Arc<AtomicU64>,
}

impl SessionHandle {
    pub(crate) fn new(command_tx: mpsc::Sender<SessionCommand>, generation: Arc<AtomicU64>) -> Self {
        Self {
            command_tx,
            generation,
        }
    }

    /// Acquires local media. Retry after a `DeviceError` is allowed.
    pub async fn ready(&self) -> Result<(), SessionError> {
        self.request(|reply| SessionCommand::Ready { reply }).await?
    }

    pub async fn join(&self, room_id: &str) -> Result<(), SessionError> {
        let room_id = RoomId::parse(room_id)?;
        self.request(|reply| SessionCommand::Join { room_id, reply })
            .await?
    }

    /// Any engine operation still in flight is abandoned as soon as this is
    /// called, before the controller gets to the command.
    pub async fn leave(&self) -> Result<(), SessionError> {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.request(|reply| SessionCommand::Leave { reply }).await?
    }

    /// Returns how many tracks changed.
    pub async fn set_enabled(&self, kind: TrackKind, enabled: bool) -> Result<usize, SessionError> {
        self.request(|reply| SessionCommand::SetEnabled {
            kind,
            enabled,
            reply,
        })
        .await
    }

    pub async fn toggle_media(&self) -> Result<Option<bool>, SessionError> {
        self.request(|reply| SessionCommand::ToggleMedia { reply })
            .await
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        self.request(|reply| SessionCommand::Snapshot { reply })
            .await
    }

    /// Replaces the relay connection, typically after `Disconnected`. A room
    /// held over the old connection is left first.
    pub async fn reconnect(
        &self,
        relay: Arc<dyn RelayChannel>,
        relay_rx: mpsc::UnboundedReceiver<RelayEvent>,
    ) -> Result<(), SessionError> {
        self.request(|reply| SessionCommand::Reconnect {
            relay,
            relay_rx,
            reply,
        })
        .await
    }

    pub async fn phase(&self) -> Result<SessionPhase, SessionError> {
        Ok(self.snapshot().await?.phase)
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> Result<T, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.command_tx
            .send(command(tx))
            .await
            .map_err(|_| SessionError::ControllerGone)?;
        rx.await.map_err(|_| SessionError::ControllerGone)
    }
}
