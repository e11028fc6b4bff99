//! Signaling channel
//!
//! Carries the local offer to the producer and brings back its answer.

pub mod http;

use async_trait::async_trait;
use url::Url;

use crate::peer::SessionDescription;
use crate::{Error, Result};

pub use http::{HttpSignaling, DEFAULT_SIGNALING_TIMEOUT};

/// Offer/answer exchange with a signaling endpoint
#[async_trait]
pub trait SignalingChannel: Send + Sync {
    /// Send `offer` to the endpoint at `address` and return its answer
    ///
    /// Transport failures, non-success statuses and malformed bodies are
    /// all reported as [`Error::SignalingFailed`].
    async fn exchange(&self, address: &Url, offer: &SessionDescription)
        -> Result<SessionDescription>;
}

/// Resolve the offer endpoint for a signaling address
///
/// `https://sig.example` and `https://sig.example/` both give
/// `https://sig.example/offer`; a path prefix is kept, so `https://h/api`
/// gives `https://h/api/offer`.
pub fn offer_url(address: &Url) -> Result<Url> {
    let mut base = address.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join("offer")
        .map_err(|e| Error::InvalidConfig(format!("cannot derive offer URL from {}: {}", address, e)))
}
