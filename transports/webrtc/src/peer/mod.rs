//! Media engine peers
//!
//! Engine-neutral peer traits, the webrtc-rs implementation, and the
//! reconnection policy applied when a peer's link degrades.

pub mod connection;
pub mod engine;
pub mod lifecycle;

pub use connection::{WebRtcPeer, WebRtcPeerFactory};
pub use engine::{
    ConnectionStateHandler, GatheringStateHandler, IceConnectionState, IceGatheringState,
    PeerFactory, PeerHandle, SdpType, SessionDescription, SessionStats, TrackHandler,
};
pub use lifecycle::ReconnectionPolicy;
