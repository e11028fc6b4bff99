//! Reconnection policy
//!
//! Decides whether a degraded session is renegotiated and how long the
//! controller waits first. The default reconnects immediately and forever.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Reconnection policy configuration
///
/// Controls how reconnection attempts are made after a session degrades.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconnectionPolicy {
    /// Maximum number of reconnection attempts (default: unbounded)
    pub max_attempts: Option<u32>,
    /// Initial backoff delay in milliseconds (default: 0ms)
    pub backoff_initial_ms: u64,
    /// Maximum backoff delay in milliseconds (default: 0ms)
    pub backoff_max_ms: u64,
    /// Backoff multiplier (default: 1.0)
    pub backoff_multiplier: f64,
    /// Whether to add jitter to backoff (default: false)
    pub jitter_enabled: bool,
}

impl Default for ReconnectionPolicy {
    fn default() -> Self {
        Self::immediate()
    }
}

impl ReconnectionPolicy {
    /// Reconnect at once, without limit
    pub fn immediate() -> Self {
        Self {
            max_attempts: None,
            backoff_initial_ms: 0,
            backoff_max_ms: 0,
            backoff_multiplier: 1.0,
            jitter_enabled: false,
        }
    }

    /// Bounded exponential backoff with jitter
    pub fn exponential() -> Self {
        Self {
            max_attempts: Some(5),
            backoff_initial_ms: 1000,
            backoff_max_ms: 30000,
            backoff_multiplier: 2.0,
            jitter_enabled: true,
        }
    }

    /// Cap the number of attempts
    pub fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Calculate backoff duration for a given attempt number
    ///
    /// Uses exponential backoff with optional jitter.
    ///
    /// # Arguments
    /// * `attempt` - Current attempt number (0-indexed)
    ///
    /// # Returns
    /// Duration to wait before next reconnection attempt
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let backoff_ms =
            (self.backoff_initial_ms as f64) * self.backoff_multiplier.powi(attempt as i32);

        // Clamp to maximum
        let backoff_ms = backoff_ms.min(self.backoff_max_ms as f64);

        // Add jitter (0-25% of backoff)
        let final_ms = if self.jitter_enabled {
            backoff_ms + rand_jitter(backoff_ms * 0.25)
        } else {
            backoff_ms
        };

        Duration::from_millis(final_ms as u64)
    }

    /// Check if more attempts are allowed after `attempt` failed ones
    pub fn should_retry(&self, attempt: u32) -> bool {
        match self.max_attempts {
            Some(max) => attempt < max,
            None => true,
        }
    }
}

/// Simple pseudo-random jitter using time-based seed
fn rand_jitter(max: f64) -> f64 {
    let seed = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos() as f64;
    (seed % 1000.0) / 1000.0 * max
}
