//! Renderer collaborator

use super::tracks::RemoteTrack;
use crate::session::AttemptId;

/// Playback lifecycle notifications reported by a renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererEvent {
    /// Enough media arrived to describe the stream (not yet playing)
    Loaded,
    /// Playback started or resumed; first frame rendered
    Playing,
    /// Playback paused waiting for more data
    Waiting,
    /// Data stopped arriving
    Stalled,
}

/// Playback sink for received tracks
///
/// Implementations must not block; the session controller calls them from
/// its event loop. Events reported back for a track carry the `attempt` it
/// was attached with, so late events from a replaced session are dropped.
pub trait Renderer: Send + Sync {
    /// Attach a newly received remote track belonging to `attempt`
    fn attach_track(&self, attempt: AttemptId, track: RemoteTrack);

    /// Drop every attached track (the session that produced them is gone)
    fn detach_all(&self);
}
