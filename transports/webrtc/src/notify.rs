//! User-facing notifications
//!
//! The controller reports failures and link loss as [`Notice`]s. What a
//! notifier does with them (toast, log line, desktop notification) is up to
//! the embedding application; it gets content only, never retry control.

use std::fmt;
use tracing::warn;

/// A human-readable failure or degradation message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The configuration snapshot was rejected
    InvalidConfiguration(String),
    /// The offer/answer exchange failed
    NegotiationFailed(String),
    /// An established link was lost; a new session is being negotiated
    ConnectionLost,
    /// The reconnection policy ran out of attempts
    ReconnectGivenUp {
        /// Attempts made since the last successful negotiation
        attempts: u32,
    },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::InvalidConfiguration(reason) => write!(f, "Invalid configuration: {}", reason),
            Notice::NegotiationFailed(reason) => {
                write!(f, "Error during negotiation: {}", reason)
            }
            Notice::ConnectionLost => f.write_str("Connection lost, reconnecting"),
            Notice::ReconnectGivenUp { attempts } => {
                write!(f, "Connection lost, gave up after {} attempts", attempts)
            }
        }
    }
}

/// Sink for user-facing notices
pub trait Notifier: Send + Sync {
    /// Deliver a notice
    fn notify(&self, notice: Notice);
}

/// Notifier that writes notices to the tracing log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        warn!(notice = %notice, "viewer notice");
    }
}
