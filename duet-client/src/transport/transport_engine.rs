use crate::media::LocalMedia;
use crate::transport::TransportEvents;
use async_trait::async_trait;
use duet_core::{IceCandidate, SessionDescription, TransportFailure};

/// The direct peer-to-peer transport of one session.
#[async_trait]
pub trait TransportEngine: Send + Sync {
    async fn create_offer(&self) -> Result<SessionDescription, TransportFailure>;

    async fn create_answer(&self) -> Result<SessionDescription, TransportFailure>;

    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), TransportFailure>;

    async fn set_remote_description(&self, desc: SessionDescription)
    -> Result<(), TransportFailure>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), TransportFailure>;

    /// Releases every resource. Must be safe to call more than once.
    async fn close(&self);
}

/// Builds one engine per peer session, with the local tracks already attached.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn create(
        &self,
        media: &LocalMedia,
        events: TransportEvents,
    ) -> Result<Box<dyn TransportEngine>, TransportFailure>;
}
