//! Remote media tracks

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::track::track_remote::TrackRemote;

/// Media kind of a transceiver or track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Audio
    Audio,
    /// Video
    Video,
}

impl MediaKind {
    /// Engine codec type for this kind
    pub fn codec_type(self) -> RTPCodecType {
        match self {
            MediaKind::Audio => RTPCodecType::Audio,
            MediaKind::Video => RTPCodecType::Video,
        }
    }

    /// Map an engine codec type, if it names a media kind
    pub fn from_codec_type(kind: RTPCodecType) -> Option<Self> {
        match kind {
            RTPCodecType::Audio => Some(MediaKind::Audio),
            RTPCodecType::Video => Some(MediaKind::Video),
            _ => None,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Audio => f.write_str("audio"),
            MediaKind::Video => f.write_str("video"),
        }
    }
}

/// A media track received from the remote peer
///
/// Cloning is cheap; clones share the engine track handle.
#[derive(Clone)]
pub struct RemoteTrack {
    id: String,
    stream_id: String,
    kind: MediaKind,
    remote: Option<Arc<TrackRemote>>,
}

impl RemoteTrack {
    /// Create a track description without an engine handle
    pub fn new(id: impl Into<String>, stream_id: impl Into<String>, kind: MediaKind) -> Self {
        Self {
            id: id.into(),
            stream_id: stream_id.into(),
            kind,
            remote: None,
        }
    }

    /// Wrap a webrtc-rs remote track
    ///
    /// Returns `None` for tracks whose codec type is unspecified.
    pub fn from_webrtc(track: Arc<TrackRemote>) -> Option<Self> {
        let kind = MediaKind::from_codec_type(track.kind())?;
        Some(Self {
            id: track.id(),
            stream_id: track.stream_id(),
            kind,
            remote: Some(track),
        })
    }

    /// Track ID
    pub fn id(&self) -> &str {
        &self.id
    }

    /// ID of the media stream the track belongs to
    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    /// Media kind
    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    /// Underlying engine track, for reading RTP
    pub fn remote(&self) -> Option<&Arc<TrackRemote>> {
        self.remote.as_ref()
    }
}

impl fmt::Debug for RemoteTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteTrack")
            .field("id", &self.id)
            .field("stream_id", &self.stream_id)
            .field("kind", &self.kind)
            .field("has_remote", &self.remote.is_some())
            .finish()
    }
}
