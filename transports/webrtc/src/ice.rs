//! ICE server resolution
//!
//! Turns a [`ViewerConfig`] into the ordered relay/reflexive server list
//! handed to the media engine. STUN comes before TURN; absent fields are
//! left out rather than emitted as empty strings.

use serde::{Deserialize, Serialize};

use crate::config::{non_blank, ViewerConfig};

/// One ICE server entry, in the shape browsers accept for `iceServers`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServer {
    /// Server URLs
    pub urls: Vec<String>,

    /// Username (TURN only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Credential (TURN only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

impl IceServer {
    /// A STUN/TURN entry without credentials
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: None,
            credential: None,
        }
    }
}

/// Resolve the ICE servers for one negotiation attempt
///
/// Returns an empty list when neither STUN nor TURN is configured, which
/// leaves the engine with host candidates only. Blank values count as
/// absent.
pub fn resolve(config: &ViewerConfig) -> Vec<IceServer> {
    let mut servers = Vec::with_capacity(2);

    if let Some(stun) = non_blank(config.stun.clone()) {
        servers.push(IceServer::url(stun));
    }

    if let Some(url) = non_blank(config.turn.url.clone()) {
        servers.push(IceServer {
            urls: vec![url],
            username: non_blank(config.turn.username.clone()),
            credential: non_blank(config.turn.password.clone()),
        });
    }

    servers
}
