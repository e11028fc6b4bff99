//! webrtc-rs backed peer connection

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::ice_transport::ice_gatherer_state::RTCIceGathererState;
use webrtc::ice_transport::ice_gathering_state::RTCIceGatheringState;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::{RTCRtpTransceiver, RTCRtpTransceiverInit};
use webrtc::stats::StatsReportType;
use webrtc::track::track_remote::TrackRemote;

use super::engine::{
    ConnectionStateHandler, GatheringStateHandler, IceConnectionState, IceGatheringState,
    PeerFactory, PeerHandle, SdpType, SessionDescription, TrackHandler, SessionStats,
};
use crate::ice::IceServer;
use crate::media::{MediaKind, RemoteTrack};
use crate::{Error, Result};

impl From<&IceServer> for RTCIceServer {
    fn from(server: &IceServer) -> Self {
        #[allow(clippy::needless_update)]
        RTCIceServer {
            urls: server.urls.clone(),
            username: server.username.clone().unwrap_or_default(),
            credential: server.credential.clone().unwrap_or_default(),
            ..Default::default()
        }
    }
}

/// Factory producing [`WebRtcPeer`]s
#[derive(Debug, Default, Clone, Copy)]
pub struct WebRtcPeerFactory;

#[async_trait]
impl PeerFactory for WebRtcPeerFactory {
    async fn create_peer(&self, ice_servers: &[IceServer]) -> Result<Arc<dyn PeerHandle>> {
        let peer = WebRtcPeer::new(ice_servers).await?;
        Ok(Arc::new(peer))
    }
}

/// WebRTC peer connection wrapper
///
/// Wraps a webrtc::RTCPeerConnection behind the engine-neutral
/// [`PeerHandle`] interface.
pub struct WebRtcPeer {
    /// Unique identifier for this connection instance
    connection_id: String,

    /// Actual WebRTC peer connection
    peer_connection: Arc<RTCPeerConnection>,
}

impl WebRtcPeer {
    /// Create a new peer connection
    ///
    /// # Arguments
    ///
    /// * `ice_servers` - Resolved STUN/TURN servers, possibly empty
    #[instrument(skip_all, fields(ice_servers = ice_servers.len()))]
    pub async fn new(ice_servers: &[IceServer]) -> Result<Self> {
        let connection_id = uuid::Uuid::new_v4().to_string();

        info!("Creating peer connection: connection_id={}", connection_id);

        // Create MediaEngine with default codecs (Opus, VP8/VP9/H.264)
        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(|e| Error::WebRtcError(format!("Failed to register codecs: {}", e)))?;

        let interceptor_registry = register_default_interceptors(Registry::new(), &mut media_engine)
            .map_err(|e| Error::WebRtcError(format!("Failed to register interceptors: {}", e)))?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(interceptor_registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: ice_servers.iter().map(RTCIceServer::from).collect(),
            ..Default::default()
        };

        let peer_connection =
            Arc::new(api.new_peer_connection(rtc_config).await.map_err(|e| {
                Error::WebRtcError(format!("Failed to create peer connection: {}", e))
            })?);

        Ok(Self {
            connection_id,
            peer_connection,
        })
    }

    /// Get the connection ID
    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    /// Get the underlying WebRTC peer connection
    pub fn peer_connection(&self) -> &Arc<RTCPeerConnection> {
        &self.peer_connection
    }
}

#[async_trait]
impl PeerHandle for WebRtcPeer {
    async fn add_recvonly_transceiver(&self, kind: MediaKind) -> Result<()> {
        self.peer_connection
            .add_transceiver_from_kind(
                kind.codec_type(),
                Some(RTCRtpTransceiverInit {
                    direction: RTCRtpTransceiverDirection::Recvonly,
                    send_encodings: vec![],
                }),
            )
            .await
            .map_err(|e| {
                Error::MediaTrackError(format!("Failed to add {} transceiver: {}", kind, e))
            })?;

        debug!("Added recvonly {} transceiver to {}", kind, self.connection_id);
        Ok(())
    }

    async fn create_offer(&self) -> Result<SessionDescription> {
        let offer = self
            .peer_connection
            .create_offer(None)
            .await
            .map_err(|e| Error::SdpError(format!("Failed to create offer: {}", e)))?;
        from_rtc(&offer)
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<()> {
        self.peer_connection
            .set_local_description(to_rtc(desc)?)
            .await
            .map_err(|e| Error::SdpError(format!("Failed to set local description: {}", e)))
    }

    async fn local_description(&self) -> Option<SessionDescription> {
        let desc = self.peer_connection.local_description().await?;
        from_rtc(&desc).ok()
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()> {
        self.peer_connection
            .set_remote_description(to_rtc(desc)?)
            .await
            .map_err(|e| Error::SdpError(format!("Failed to set remote description: {}", e)))
    }

    fn ice_gathering_state(&self) -> IceGatheringState {
        match self.peer_connection.ice_gathering_state() {
            RTCIceGatheringState::Gathering => IceGatheringState::Gathering,
            RTCIceGatheringState::Complete => IceGatheringState::Complete,
            _ => IceGatheringState::New,
        }
    }

    fn ice_connection_state(&self) -> IceConnectionState {
        connection_state(self.peer_connection.ice_connection_state())
    }

    fn on_ice_gathering_state_change(&self, handler: Option<GatheringStateHandler>) {
        match handler {
            Some(handler) => self.peer_connection.on_ice_gathering_state_change(Box::new(
                move |state: RTCIceGathererState| {
                    let mapped = match state {
                        RTCIceGathererState::New => Some(IceGatheringState::New),
                        RTCIceGathererState::Gathering => Some(IceGatheringState::Gathering),
                        RTCIceGathererState::Complete => Some(IceGatheringState::Complete),
                        _ => None,
                    };
                    if let Some(state) = mapped {
                        handler(state);
                    }
                    Box::pin(async {})
                },
            )),
            None => self
                .peer_connection
                .on_ice_gathering_state_change(Box::new(|_| Box::pin(async {}))),
        }
    }

    fn on_ice_connection_state_change(&self, handler: Option<ConnectionStateHandler>) {
        match handler {
            Some(handler) => self.peer_connection.on_ice_connection_state_change(Box::new(
                move |state: RTCIceConnectionState| {
                    handler(connection_state(state));
                    Box::pin(async {})
                },
            )),
            None => self
                .peer_connection
                .on_ice_connection_state_change(Box::new(|_| Box::pin(async {}))),
        }
    }

    fn on_track(&self, handler: Option<TrackHandler>) {
        match handler {
            Some(handler) => self.peer_connection.on_track(Box::new(
                move |track: Arc<TrackRemote>,
                      _receiver: Arc<RTCRtpReceiver>,
                      _transceiver: Arc<RTCRtpTransceiver>| {
                    if let Some(track) = RemoteTrack::from_webrtc(track) {
                        handler(track);
                    }
                    Box::pin(async {})
                },
            )),
            None => self
                .peer_connection
                .on_track(Box::new(|_, _, _| Box::pin(async {}))),
        }
    }

    async fn stats(&self) -> Result<SessionStats> {
        let report = self.peer_connection.get_stats().await;
        let mut stats = SessionStats::default();

        for entry in report.reports.values() {
            match entry {
                StatsReportType::InboundRTP(inbound) => stats.bytes_received += inbound.bytes_received,
                StatsReportType::OutboundRTP(outbound) => stats.bytes_sent += outbound.bytes_sent,
                _ => {}
            }
        }

        Ok(stats)
    }

    async fn close(&self) -> Result<()> {
        info!("Closing peer connection {}", self.connection_id);

        self.peer_connection.close().await.map_err(|e| {
            Error::PeerConnectionError(format!("Failed to close connection: {}", e))
        })
    }
}

fn connection_state(state: RTCIceConnectionState) -> IceConnectionState {
    match state {
        RTCIceConnectionState::Checking => IceConnectionState::Checking,
        RTCIceConnectionState::Connected => IceConnectionState::Connected,
        RTCIceConnectionState::Completed => IceConnectionState::Completed,
        RTCIceConnectionState::Disconnected => IceConnectionState::Disconnected,
        RTCIceConnectionState::Failed => IceConnectionState::Failed,
        RTCIceConnectionState::Closed => IceConnectionState::Closed,
        _ => IceConnectionState::New,
    }
}

fn to_rtc(desc: SessionDescription) -> Result<RTCSessionDescription> {
    let sdp_type = desc.sdp_type;
    let parsed = match sdp_type {
        SdpType::Offer => RTCSessionDescription::offer(desc.sdp),
        SdpType::Answer => RTCSessionDescription::answer(desc.sdp),
        SdpType::Pranswer => RTCSessionDescription::pranswer(desc.sdp),
        SdpType::Rollback => {
            return Err(Error::SdpError(
                "rollback descriptions are not supported".to_string(),
            ))
        }
    };
    parsed.map_err(|e| Error::SdpError(format!("Failed to parse {} SDP: {}", sdp_type, e)))
}

fn from_rtc(desc: &RTCSessionDescription) -> Result<SessionDescription> {
    let sdp_type = match desc.sdp_type {
        RTCSdpType::Offer => SdpType::Offer,
        RTCSdpType::Answer => SdpType::Answer,
        RTCSdpType::Pranswer => SdpType::Pranswer,
        RTCSdpType::Rollback => SdpType::Rollback,
        other => {
            return Err(Error::SdpError(format!(
                "unexpected SDP type from engine: {}",
                other
            )))
        }
    };
    Ok(SessionDescription {
        sdp: desc.sdp.clone(),
        sdp_type,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ice_server_conversion_fills_engine_defaults() {
        let rtc = RTCIceServer::from(&IceServer::url("stun:stun.l.google.com:19302"));
        assert_eq!(rtc.urls, vec!["stun:stun.l.google.com:19302".to_string()]);
        assert!(rtc.username.is_empty());
        assert!(rtc.credential.is_empty());

        let turn = IceServer {
            urls: vec!["turn:turn.example.com:3478".to_string()],
            username: Some("user".to_string()),
            credential: Some("pass".to_string()),
        };
        let rtc = RTCIceServer::from(&turn);
        assert_eq!(rtc.username, "user");
        assert_eq!(rtc.credential, "pass");
    }

    #[test]
    fn test_connection_state_mapping() {
        assert_eq!(
            connection_state(RTCIceConnectionState::Disconnected),
            IceConnectionState::Disconnected
        );
        assert_eq!(
            connection_state(RTCIceConnectionState::Unspecified),
            IceConnectionState::New
        );
    }

    #[test]
    fn test_rollback_is_rejected() {
        let desc = SessionDescription {
            sdp: String::new(),
            sdp_type: SdpType::Rollback,
        };
        assert!(matches!(to_rtc(desc), Err(Error::SdpError(_))));
    }

    #[tokio::test]
    async fn test_peer_declares_recvonly_video_and_offers() {
        let peer = WebRtcPeer::new(&[]).await.unwrap();
        assert_eq!(peer.ice_gathering_state(), IceGatheringState::New);
        assert_eq!(peer.ice_connection_state(), IceConnectionState::New);

        peer.add_recvonly_transceiver(MediaKind::Video).await.unwrap();
        let offer = peer.create_offer().await.unwrap();
        assert_eq!(offer.sdp_type, SdpType::Offer);
        assert!(offer.sdp.contains("m=video"));
        assert!(offer.sdp.contains("a=recvonly"));

        peer.close().await.unwrap();
    }
}
