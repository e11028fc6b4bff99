//! HTTP signaling: `POST {address}/offer` with a JSON description

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::Url;

use super::{offer_url, SignalingChannel};
use crate::peer::{SdpType, SessionDescription};
use crate::{Error, Result};

/// Default timeout for one offer/answer round trip
pub const DEFAULT_SIGNALING_TIMEOUT: Duration = Duration::from_secs(10);

/// Signaling over a plain HTTP POST
#[derive(Debug, Clone)]
pub struct HttpSignaling {
    client: reqwest::Client,
}

impl HttpSignaling {
    /// Create a signaling client with the given per-request timeout
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::SignalingFailed(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// Use an existing reqwest client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SignalingChannel for HttpSignaling {
    #[instrument(skip_all, fields(address = %address))]
    async fn exchange(
        &self,
        address: &Url,
        offer: &SessionDescription,
    ) -> Result<SessionDescription> {
        let url = offer_url(address)?;
        debug!("Posting {} ({} bytes of SDP) to {}", offer.sdp_type, offer.sdp.len(), url);

        let response = self
            .client
            .post(url.clone())
            .json(offer)
            .send()
            .await
            .map_err(|e| Error::SignalingFailed(format!("Failed to call {}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            warn!("Signaling endpoint {} answered {}", url, status);
            return Err(Error::SignalingFailed(format!("HTTP {}", status)));
        }

        let answer: SessionDescription = response
            .json()
            .await
            .map_err(|e| Error::SignalingFailed(format!("Invalid answer payload: {}", e)))?;

        if answer.sdp_type != SdpType::Answer {
            return Err(Error::SignalingFailed(format!(
                "Unexpected SDP type from server: {}",
                answer.sdp_type
            )));
        }

        debug!("Received answer ({} bytes of SDP)", answer.sdp.len());
        Ok(answer)
    }
}
