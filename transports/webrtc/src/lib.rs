//! WebRTC viewer session core for SmartStream
//!
//! This crate negotiates a one-way (receive-only) WebRTC session with a
//! media producer through an HTTP signaling endpoint, watches the link, and
//! renegotiates when it degrades.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │  ViewerConfig snapshots (address, STUN, TURN)          │
//! │  ↓                                                     │
//! │  SessionController (actor, one Session at a time)      │
//! │  ├─ ice::resolve        (config → ICE server list)     │
//! │  ├─ SessionNegotiator   (offer, gather, POST, answer)  │
//! │  │   ├─ PeerFactory / PeerHandle (webrtc-rs engine)    │
//! │  │   └─ SignalingChannel (POST {address}/offer)        │
//! │  ├─ ConnectionMonitor   (ICE state → degraded signal)  │
//! │  └─ Renderer / Notifier (external collaborators)       │
//! │     ↓                                                  │
//! │  ViewerState (Idle/Negotiating/Connected/Degraded/...) │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use smartstream_webrtc::{ice, ViewerConfig};
//!
//! let config = ViewerConfig::new()
//!     .with_address("https://sig.example/")
//!     .unwrap()
//!     .with_stun("stun:stun.l.google.com:19302");
//!
//! assert!(config.validate().is_ok());
//! assert_eq!(ice::resolve(&config).len(), 1);
//! ```
//!
//! ## Async Usage
//!
//! ```no_run
//! use smartstream_webrtc::{
//!     AttemptId, ControllerDeps, HttpSignaling, RemoteTrack, Renderer, SessionController,
//!     TracingNotifier, ViewerConfig, WebRtcPeerFactory,
//! };
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! struct NullRenderer;
//!
//! impl Renderer for NullRenderer {
//!     fn attach_track(&self, _attempt: AttemptId, _track: RemoteTrack) {}
//!     fn detach_all(&self) {}
//! }
//!
//! # async fn example() -> smartstream_webrtc::Result<()> {
//! let handle = SessionController::spawn(ControllerDeps::new(
//!     Arc::new(WebRtcPeerFactory),
//!     Arc::new(HttpSignaling::new(Duration::from_secs(10))?),
//!     Arc::new(NullRenderer),
//!     Arc::new(TracingNotifier),
//! ));
//!
//! handle.apply_config(ViewerConfig::new().with_address("http://localhost:8080/")?)?;
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all)]

// Public modules
pub mod config;
pub mod controller;
pub mod error;
pub mod ice;
pub mod media;
pub mod notify;
pub mod peer;
pub mod session;
pub mod signaling;

// Re-exports for public API
pub use config::{NegotiationOptions, TurnConfig, ViewerConfig};
pub use controller::{
    ControllerDeps, ControllerHandle, ControllerState, LoadingState, SessionController,
    ViewerState,
};
pub use error::{Error, NegotiationError, Result};
pub use ice::IceServer;
pub use media::{MediaKind, RemoteTrack, Renderer, RendererEvent};
pub use notify::{Notice, Notifier, TracingNotifier};
pub use peer::{
    IceConnectionState, IceGatheringState, PeerFactory, PeerHandle, ReconnectionPolicy,
    SdpType, SessionDescription, SessionStats, WebRtcPeer, WebRtcPeerFactory,
};
pub use session::{AttemptId, ConnectionMonitor, DegradedSignal, Session, SessionNegotiator};
pub use signaling::{HttpSignaling, SignalingChannel};

/// Get the version of this crate
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
