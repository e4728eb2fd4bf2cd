use crate::media::{LocalMedia, LocalTrack, MediaSource};
use async_trait::async_trait;
use duet_core::{DeviceError, TrackKind};

/// Device-less media source for headless peers and tests.
#[derive(Debug, Clone)]
pub struct SyntheticMediaSource {
    kinds: Vec<TrackKind>,
    failure: Option<DeviceError>,
}

impl SyntheticMediaSource {
    /// One audio and one video track.
    pub fn new() -> Self {
        Self::with_kinds(vec![TrackKind::Audio, TrackKind::Video])
    }

    pub fn with_kinds(kinds: Vec<TrackKind>) -> Self {
        Self {
            kinds,
            failure: None,
        }
    }

    /// Every `acquire` fails with `error`.
    pub fn failing(error: DeviceError) -> Self {
        Self {
            kinds: Vec::new(),
            failure: Some(error),
        }
    }
}

impl Default for SyntheticMediaSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaSource for SyntheticMediaSource {
    async fn acquire(&self) -> Result<LocalMedia, DeviceError> {
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        let tracks = self.kinds.iter().copied().map(LocalTrack::new).collect();
        Ok(LocalMedia::new(tracks))
    }
}
