//! Configuration types for the viewer
//!
//! [`ViewerConfig`] is the immutable snapshot handed to the session
//! controller; every new snapshot invalidates the running session.
//! [`NegotiationOptions`] tunes a single negotiation attempt.

use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::signaling::DEFAULT_SIGNALING_TIMEOUT;
use crate::{Error, Result};

/// Connection configuration snapshot
///
/// Field names match the persisted store of the browser client, so a saved
/// `{"address": ..., "stun": ..., "turn": {...}}` document loads directly.
/// Blank strings (as produced by an empty form field) load as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewerConfig {
    /// Signaling server base URL (http:// or https://)
    #[serde(default, deserialize_with = "blank_as_none_url")]
    pub address: Option<Url>,

    /// STUN server URL (stun: or stuns:)
    #[serde(default, deserialize_with = "blank_as_none")]
    pub stun: Option<String>,

    /// TURN relay configuration
    #[serde(default)]
    pub turn: TurnConfig,
}

/// TURN server configuration
///
/// Every field is optional; a relay is only offered when `url` is present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnConfig {
    /// TURN server URL (turn: or turns:)
    #[serde(default, deserialize_with = "blank_as_none")]
    pub url: Option<String>,

    /// Username for TURN authentication
    #[serde(default, deserialize_with = "blank_as_none")]
    pub username: Option<String>,

    /// Password for TURN authentication
    #[serde(default, deserialize_with = "blank_as_none")]
    pub password: Option<String>,
}

impl ViewerConfig {
    /// Create an empty configuration (no address: the controller stays idle)
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the signaling address
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if `address` is not an absolute URL.
    pub fn with_address(mut self, address: &str) -> Result<Self> {
        let url = Url::parse(address.trim()).map_err(|e| {
            Error::InvalidConfig(format!("address '{}' is not a valid URL: {}", address, e))
        })?;
        self.address = Some(url);
        Ok(self)
    }

    /// Set the STUN server URL
    pub fn with_stun(mut self, stun: impl Into<String>) -> Self {
        self.stun = Some(stun.into());
        self
    }

    /// Set the TURN relay
    pub fn with_turn(
        mut self,
        url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.turn = TurnConfig {
            url: Some(url.into()),
            username: Some(username.into()),
            password: Some(password.into()),
        };
        self
    }

    /// Load a configuration snapshot from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: ViewerConfig = serde_json::from_str(&raw).map_err(|e| {
            Error::InvalidConfig(format!(
                "failed to parse {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Ok(config.normalized())
    }

    /// Return a copy with blank and whitespace-only fields treated as absent
    pub fn normalized(mut self) -> Self {
        self.stun = non_blank(self.stun);
        self.turn.url = non_blank(self.turn.url);
        self.turn.username = non_blank(self.turn.username);
        self.turn.password = non_blank(self.turn.password);
        self
    }

    /// Whether a signaling address is configured
    pub fn has_address(&self) -> bool {
        self.address.is_some()
    }

    /// Validate configuration parameters
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `address` is not an http:// or https:// URL
    /// - `stun` does not start with `stun:` or `stuns:`
    /// - `turn.url` does not start with `turn:` or `turns:`
    /// - `turn.url` is set without both a username and a password
    pub fn validate(&self) -> Result<()> {
        if let Some(address) = &self.address {
            if address.scheme() != "http" && address.scheme() != "https" {
                return Err(Error::InvalidConfig(format!(
                    "address must be an http:// or https:// URL, got {}",
                    address
                )));
            }
            if address.cannot_be_a_base() {
                return Err(Error::InvalidConfig(format!(
                    "address cannot be used as a base URL: {}",
                    address
                )));
            }
        }

        if let Some(stun) = &self.stun {
            if !stun.starts_with("stun:") && !stun.starts_with("stuns:") {
                return Err(Error::InvalidConfig(format!(
                    "stun must start with stun: or stuns:, got {}",
                    stun
                )));
            }
        }

        if let Some(url) = &self.turn.url {
            if !url.starts_with("turn:") && !url.starts_with("turns:") {
                return Err(Error::InvalidConfig(format!(
                    "turn.url must start with turn: or turns:, got {}",
                    url
                )));
            }
            if self.turn.username.is_none() || self.turn.password.is_none() {
                return Err(Error::InvalidConfig(
                    "turn.url requires both turn.username and turn.password".to_string(),
                ));
            }
        }

        Ok(())
    }
}

/// Options for a single negotiation attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NegotiationOptions {
    /// Declare a receive-only audio transceiver alongside video (default: false)
    pub receive_audio: bool,

    /// Upper bound on the ICE gathering wait in milliseconds
    /// (default: 5000, `None` waits indefinitely)
    pub ice_gathering_timeout_ms: Option<u64>,

    /// Timeout for the signaling HTTP round trip in milliseconds (default: 10000)
    pub signaling_timeout_ms: u64,
}

impl Default for NegotiationOptions {
    fn default() -> Self {
        Self {
            receive_audio: false,
            ice_gathering_timeout_ms: Some(5000),
            signaling_timeout_ms: millis(DEFAULT_SIGNALING_TIMEOUT),
        }
    }
}

impl NegotiationOptions {
    /// Also receive audio
    pub fn with_audio(mut self, receive_audio: bool) -> Self {
        self.receive_audio = receive_audio;
        self
    }

    /// Set the ICE gathering bound (`None` disables it)
    pub fn with_ice_gathering_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.ice_gathering_timeout_ms = timeout.map(millis);
        self
    }

    /// Set the signaling round-trip timeout
    pub fn with_signaling_timeout(mut self, timeout: Duration) -> Self {
        self.signaling_timeout_ms = millis(timeout);
        self
    }

    /// ICE gathering bound as a duration
    pub fn ice_gathering_timeout(&self) -> Option<Duration> {
        self.ice_gathering_timeout_ms.map(Duration::from_millis)
    }

    /// Signaling round-trip timeout as a duration
    pub fn signaling_timeout(&self) -> Duration {
        Duration::from_millis(self.signaling_timeout_ms)
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn blank_as_none<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(non_blank(value))
}

fn blank_as_none_url<'de, D>(deserializer: D) -> std::result::Result<Option<Url>, D::Error>
where
    D: Deserializer<'de>,
{
    match blank_as_none(deserializer)? {
        Some(raw) => Url::parse(&raw)
            .map(Some)
            .map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}
