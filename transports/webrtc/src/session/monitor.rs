//! Connection health monitoring
//!
//! Turns ICE connection state notifications into a single `degraded`
//! signal per transition into {disconnected, failed, closed}.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use super::{AttemptId, Session};
use crate::peer::{IceConnectionState, PeerHandle};

/// Raised when a session's link is lost
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DegradedSignal {
    /// Attempt whose session degraded
    pub attempt: AttemptId,
    /// ICE connection state that triggered the signal
    pub state: IceConnectionState,
}

type DegradedSink = Arc<dyn Fn(DegradedSignal) + Send + Sync>;

/// Observes sessions and reports link loss
#[derive(Clone)]
pub struct ConnectionMonitor {
    sink: DegradedSink,
}

impl ConnectionMonitor {
    /// Create a monitor delivering signals to `sink`
    pub fn new<F>(sink: F) -> Self
    where
        F: Fn(DegradedSignal) + Send + Sync + 'static,
    {
        Self {
            sink: Arc::new(sink),
        }
    }

    /// Start watching `session`
    ///
    /// Installs the session's ICE connection state handler. A state already
    /// degraded at attach time counts as the starting point, not as a
    /// transition.
    pub fn attach(&self, session: &Session) -> Subscription {
        let attempt = session.attempt();
        let active = Arc::new(AtomicBool::new(true));
        let degraded = AtomicBool::new(session.ice_connection_state().is_degraded());

        let sink = Arc::clone(&self.sink);
        let handler_active = Arc::clone(&active);
        session
            .peer()
            .on_ice_connection_state_change(Some(Box::new(move |state: IceConnectionState| {
                if !handler_active.load(Ordering::SeqCst) {
                    return;
                }
                debug!("{} ICE connection state: {:?}", attempt, state);

                let now_degraded = state.is_degraded();
                let was_degraded = degraded.swap(now_degraded, Ordering::SeqCst);
                if now_degraded && !was_degraded {
                    warn!("{} degraded: ICE connection state {:?}", attempt, state);
                    sink(DegradedSignal { attempt, state });
                }
            })));

        Subscription {
            attempt,
            active,
            peer: Arc::clone(session.peer()),
        }
    }
}

/// Handle to one attached monitor
///
/// Detaching (explicitly or on drop) clears the handler; no signal is
/// emitted for the session afterwards.
pub struct Subscription {
    attempt: AttemptId,
    active: Arc<AtomicBool>,
    peer: Arc<dyn PeerHandle>,
}

impl Subscription {
    /// Attempt being watched
    pub fn attempt(&self) -> AttemptId {
        self.attempt
    }

    /// Whether signals can still be emitted
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Stop watching. Idempotent.
    pub fn detach(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            self.peer.on_ice_connection_state_change(None);
            debug!("Detached connection monitor from {}", self.attempt);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}
