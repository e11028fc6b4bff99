//! Media engine abstraction
//!
//! The session core talks to the media engine only through [`PeerFactory`]
//! and [`PeerHandle`]. Event handlers are single-slot: installing one
//! replaces the previous handler, installing `None` clears the slot and
//! drops whatever the old handler captured.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::ice::IceServer;
use crate::media::{MediaKind, RemoteTrack};
use crate::Result;

/// Handler for ICE gathering state changes
pub type GatheringStateHandler = Box<dyn Fn(IceGatheringState) + Send + Sync>;

/// Handler for ICE connection state changes
pub type ConnectionStateHandler = Box<dyn Fn(IceConnectionState) + Send + Sync>;

/// Handler for remote tracks
pub type TrackHandler = Box<dyn Fn(RemoteTrack) + Send + Sync>;

/// SDP description type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    /// Offer
    Offer,
    /// Provisional answer
    Pranswer,
    /// Answer
    Answer,
    /// Rollback
    Rollback,
}

impl fmt::Display for SdpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SdpType::Offer => "offer",
            SdpType::Pranswer => "pranswer",
            SdpType::Answer => "answer",
            SdpType::Rollback => "rollback",
        };
        f.write_str(s)
    }
}

/// Session description, serialized as `{"sdp": "...", "type": "offer"}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    /// SDP body
    pub sdp: String,

    /// Description type
    #[serde(rename = "type")]
    pub sdp_type: SdpType,
}

impl SessionDescription {
    /// An offer description
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            sdp: sdp.into(),
            sdp_type: SdpType::Offer,
        }
    }

    /// An answer description
    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            sdp: sdp.into(),
            sdp_type: SdpType::Answer,
        }
    }
}

/// ICE gathering state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IceGatheringState {
    /// No gathering yet
    New,
    /// Candidates are being collected
    Gathering,
    /// All candidates collected
    Complete,
}

/// ICE connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IceConnectionState {
    /// Initial state
    New,
    /// Connectivity checks in progress
    Checking,
    /// A usable candidate pair was found
    Connected,
    /// Checks finished with a usable pair
    Completed,
    /// Connectivity lost, may recover
    Disconnected,
    /// Connectivity lost for good
    Failed,
    /// Agent shut down
    Closed,
}

impl IceConnectionState {
    /// States that count as a lost link
    pub fn is_degraded(self) -> bool {
        matches!(
            self,
            IceConnectionState::Disconnected | IceConnectionState::Failed | IceConnectionState::Closed
        )
    }
}

/// Byte counters for a peer, summed over RTP streams
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    /// Bytes received over inbound RTP streams
    pub bytes_received: u64,
    /// Bytes sent over outbound RTP streams
    pub bytes_sent: u64,
}

/// Builds engine peer instances
#[async_trait]
pub trait PeerFactory: Send + Sync {
    /// Construct a new peer configured with `ice_servers`
    async fn create_peer(&self, ice_servers: &[IceServer]) -> Result<Arc<dyn PeerHandle>>;
}

/// One engine peer connection
#[async_trait]
pub trait PeerHandle: Send + Sync {
    /// Declare a receive-only transceiver for `kind`
    async fn add_recvonly_transceiver(&self, kind: MediaKind) -> Result<()>;

    /// Create a local offer
    async fn create_offer(&self) -> Result<SessionDescription>;

    /// Apply a local description
    async fn set_local_description(&self, desc: SessionDescription) -> Result<()>;

    /// Current local description, including gathered candidates
    async fn local_description(&self) -> Option<SessionDescription>;

    /// Apply the remote description
    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()>;

    /// Current ICE gathering state
    fn ice_gathering_state(&self) -> IceGatheringState;

    /// Current ICE connection state
    fn ice_connection_state(&self) -> IceConnectionState;

    /// Install or clear the ICE gathering state handler
    fn on_ice_gathering_state_change(&self, handler: Option<GatheringStateHandler>);

    /// Install or clear the ICE connection state handler
    fn on_ice_connection_state_change(&self, handler: Option<ConnectionStateHandler>);

    /// Install or clear the remote track handler
    fn on_track(&self, handler: Option<TrackHandler>);

    /// Transfer counters
    async fn stats(&self) -> Result<SessionStats>;

    /// Close the peer and release engine resources
    async fn close(&self) -> Result<()>;
}
