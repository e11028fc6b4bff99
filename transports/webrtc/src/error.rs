//! Error types for the viewer session core

use crate::peer::IceConnectionState;
use std::time::Duration;

/// Result type alias using the viewer Error
pub type Result<T> = std::result::Result<T, Error>;

/// Failure of a single negotiation attempt.
///
/// Negotiation failures use the crate-wide error type; the alias names the
/// role at the negotiator boundary.
pub type NegotiationError = Error;

/// Errors that can occur while negotiating or supervising a viewing session
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No signaling address configured (a valid idle state, not a fault)
    #[error("No signaling address configured")]
    ConfigurationMissing,

    /// Invalid configuration parameter
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Offer/answer exchange with the signaling endpoint failed
    #[error("Signaling failed: {0}")]
    SignalingFailed(String),

    /// ICE gathering did not reach `complete` within the configured bound.
    ///
    /// Displayed as a signaling failure since the offer was never sent.
    #[error("Signaling failed: ICE gathering did not complete within {0:?}")]
    IceGatheringStalled(Duration),

    /// Established link was lost
    #[error("Connection degraded: ICE state {0:?}")]
    ConnectionDegraded(IceConnectionState),

    /// The session was disposed while an operation on it was in flight
    #[error("Session disposed")]
    SessionDisposed,

    /// WebRTC peer connection error
    #[error("Peer connection error: {0}")]
    PeerConnectionError(String),

    /// SDP negotiation error
    #[error("SDP negotiation error: {0}")]
    SdpError(String),

    /// Media track / transceiver error
    #[error("Media track error: {0}")]
    MediaTrackError(String),

    /// WebRTC library error
    #[error("WebRTC error: {0}")]
    WebRtcError(String),

    /// The session controller task is no longer running
    #[error("Session controller closed")]
    ControllerClosed,

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Any other error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Check if this error is a signaling failure.
    ///
    /// A stalled ICE gathering wait is reported as a signaling failure: the
    /// offer never left the viewer.
    pub fn is_signaling_failure(&self) -> bool {
        matches!(self, Error::SignalingFailed(_) | Error::IceGatheringStalled(_))
    }

    /// Check if this error is retryable by starting a fresh attempt
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::SignalingFailed(_)
                | Error::IceGatheringStalled(_)
                | Error::ConnectionDegraded(_)
                | Error::IoError(_)
        )
    }

    /// Check if this error is a configuration error
    pub fn is_config_error(&self) -> bool {
        matches!(self, Error::InvalidConfig(_) | Error::ConfigurationMissing)
    }
}
