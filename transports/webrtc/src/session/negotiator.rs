//! One negotiation attempt, end to end

use std::sync::Arc;
use tracing::{debug, info, instrument};
use url::Url;

use super::gathering::wait_for_gathering_complete;
use super::{AttemptId, Session};
use crate::config::NegotiationOptions;
use crate::ice::IceServer;
use crate::media::MediaKind;
use crate::peer::{PeerFactory, SdpType};
use crate::signaling::SignalingChannel;
use crate::{Error, Result};

/// Builds a session and runs the offer/answer exchange for it
///
/// Never retries; the controller decides what to do with a failure.
pub struct SessionNegotiator {
    factory: Arc<dyn PeerFactory>,
    signaling: Arc<dyn SignalingChannel>,
    options: NegotiationOptions,
}

impl SessionNegotiator {
    /// Create a negotiator
    pub fn new(
        factory: Arc<dyn PeerFactory>,
        signaling: Arc<dyn SignalingChannel>,
        options: NegotiationOptions,
    ) -> Self {
        Self {
            factory,
            signaling,
            options,
        }
    }

    /// Negotiation options in use
    pub fn options(&self) -> &NegotiationOptions {
        &self.options
    }

    /// Build the engine peer for `attempt` and declare receive-only transceivers
    ///
    /// Video is always received; audio only with `receive_audio`. The peer is
    /// disposed again if declaring a transceiver fails.
    #[instrument(skip(self, ice_servers), fields(attempt = %attempt, ice_servers = ice_servers.len()))]
    pub async fn open(&self, attempt: AttemptId, ice_servers: &[IceServer]) -> Result<Session> {
        let peer = self.factory.create_peer(ice_servers).await?;
        let session = Session::new(attempt, peer);

        if let Err(e) = self.declare_transceivers(&session).await {
            session.dispose().await?;
            return Err(e);
        }

        debug!("Opened session {}", session.connection_id());
        Ok(session)
    }

    async fn declare_transceivers(&self, session: &Session) -> Result<()> {
        session
            .peer()
            .add_recvonly_transceiver(MediaKind::Video)
            .await?;
        if self.options.receive_audio {
            session
                .peer()
                .add_recvonly_transceiver(MediaKind::Audio)
                .await?;
        }
        Ok(())
    }

    /// Run the offer/answer exchange for an opened session
    ///
    /// Creates and applies the local offer, waits for ICE gathering, posts
    /// the gathered description to `address` and applies the answer. An
    /// exchange that outlasts `signaling_timeout` fails with
    /// [`Error::SignalingFailed`]. The
    /// answer is dropped with [`Error::SessionDisposed`] if the session was
    /// disposed while the exchange was in flight.
    #[instrument(skip_all, fields(attempt = %session.attempt(), address = %address))]
    pub async fn negotiate(&self, session: &Session, address: &Url) -> Result<()> {
        let peer = session.peer();

        let offer = peer.create_offer().await?;
        peer.set_local_description(offer).await?;
        debug!("Local description applied, waiting for ICE gathering");

        wait_for_gathering_complete(peer.as_ref(), self.options.ice_gathering_timeout()).await?;
        if session.is_disposed() {
            return Err(Error::SessionDisposed);
        }

        let local = peer.local_description().await.ok_or_else(|| {
            Error::SdpError("no local description after ICE gathering".to_string())
        })?;

        let limit = self.options.signaling_timeout();
        let answer = tokio::time::timeout(limit, self.signaling.exchange(address, &local))
            .await
            .map_err(|_| Error::SignalingFailed(format!("no answer within {:?}", limit)))??;

        if session.is_disposed() {
            debug!("Discarding answer for disposed {}", session.attempt());
            return Err(Error::SessionDisposed);
        }
        if answer.sdp_type != SdpType::Answer {
            return Err(Error::SignalingFailed(format!(
                "Unexpected SDP type from server: {}",
                answer.sdp_type
            )));
        }

        peer.set_remote_description(answer).await?;
        info!("Remote description applied");
        Ok(())
    }

    /// Open and negotiate in one step
    ///
    /// On failure the half-built session is disposed before the error is
    /// returned.
    pub async fn connect(
        &self,
        attempt: AttemptId,
        address: &Url,
        ice_servers: &[IceServer],
    ) -> Result<Session> {
        let session = self.open(attempt, ice_servers).await?;
        match self.negotiate(&session, address).await {
            Ok(()) => Ok(session),
            Err(e) => {
                session.dispose().await?;
                Err(e)
            }
        }
    }
}
