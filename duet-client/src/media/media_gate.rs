use crate::media::LocalMedia;
use duet_core::TrackKind;
use tracing::info;

/// Local mute switch. Flips enablement of attached tracks in place; never
/// touches the transport or the relay, so no renegotiation can follow.
#[derive(Debug, Default)]
pub struct MediaGate {
    media: Option<LocalMedia>,
}

impl MediaGate {
    pub fn attach(&mut self, media: LocalMedia) {
        self.media = Some(media);
    }

    pub fn media(&self) -> Option<&LocalMedia> {
        self.media.as_ref()
    }

    pub fn is_ready(&self) -> bool {
        self.media.is_some()
    }

    /// Returns how many tracks were touched; zero before media exists.
    pub fn set_enabled(&self, kind: TrackKind, enabled: bool) -> usize {
        let Some(media) = &self.media else {
            return 0;
        };
        let mut touched = 0;
        for track in media.tracks_of(kind) {
            track.set_enabled(enabled);
            info!("{} {} {}", kind, track.id(), label(enabled));
            touched += 1;
        }
        touched
    }

    /// Disables everything if any track is live, otherwise enables
    /// everything. Returns the new state, or `None` without media.
    pub fn toggle_all(&self) -> Option<bool> {
        let media = self.media.as_ref()?;
        let enable = !media.tracks().iter().any(|t| t.is_enabled());
        for track in media.tracks() {
            track.set_enabled(enable);
            info!("{} {} {}", track.kind(), track.id(), label(enable));
        }
        Some(enable)
    }

    pub fn is_enabled(&self, kind: TrackKind) -> Option<bool> {
        let media = self.media.as_ref()?;
        let mut tracks = media.tracks_of(kind).peekable();
        tracks.peek()?;
        Some(tracks.all(|t| t.is_enabled()))
    }
}

fn label(enabled: bool) -> &'static str {
    if enabled { "enabled" } else { "disabled" }
}
