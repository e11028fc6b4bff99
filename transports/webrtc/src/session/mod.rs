//! Viewing sessions
//!
//! A [`Session`] is the live peer for one negotiation attempt. The
//! [`SessionNegotiator`] builds and negotiates it, the [`ConnectionMonitor`]
//! watches its link, and the controller owns and disposes it.

pub mod gathering;
pub mod monitor;
pub mod negotiator;

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use crate::media::RemoteTrack;
use crate::peer::{IceConnectionState, PeerHandle, SessionStats};
use crate::Result;

pub use gathering::wait_for_gathering_complete;
pub use monitor::{ConnectionMonitor, DegradedSignal, Subscription};
pub use negotiator::SessionNegotiator;

/// Identity of one negotiation attempt
///
/// Attempt IDs increase monotonically per controller, so an event carrying
/// an older ID than the current session's belongs to a stale attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AttemptId(u64);

impl AttemptId {
    /// Wrap a raw attempt number
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Raw attempt number
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "attempt-{}", self.0)
    }
}

/// The live peer connection of one negotiation attempt
pub struct Session {
    /// Owning attempt
    attempt: AttemptId,

    /// Unique identifier for this session instance
    connection_id: String,

    /// Engine peer
    peer: Arc<dyn PeerHandle>,

    /// Remote tracks received so far
    tracks: Arc<Mutex<Vec<RemoteTrack>>>,

    /// Set once by [`Session::dispose`]
    disposed: AtomicBool,
}

impl Session {
    /// Wrap an engine peer as the session of `attempt`
    pub fn new(attempt: AttemptId, peer: Arc<dyn PeerHandle>) -> Self {
        Self {
            attempt,
            connection_id: uuid::Uuid::new_v4().to_string(),
            peer,
            tracks: Arc::new(Mutex::new(Vec::new())),
            disposed: AtomicBool::new(false),
        }
    }

    /// Owning attempt
    pub fn attempt(&self) -> AttemptId {
        self.attempt
    }

    /// Get the connection ID
    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    /// Engine peer
    pub fn peer(&self) -> &Arc<dyn PeerHandle> {
        &self.peer
    }

    /// Current ICE connection state
    pub fn ice_connection_state(&self) -> IceConnectionState {
        self.peer.ice_connection_state()
    }

    /// Remote tracks received so far
    pub fn tracks(&self) -> Vec<RemoteTrack> {
        self.tracks.lock().clone()
    }

    /// Forward every remote track to `sink`, tagged with this session's attempt
    ///
    /// Replaces any previously installed track handler.
    pub fn route_tracks<F>(&self, sink: F)
    where
        F: Fn(AttemptId, RemoteTrack) + Send + Sync + 'static,
    {
        let attempt = self.attempt;
        let tracks = Arc::clone(&self.tracks);
        self.peer.on_track(Some(Box::new(move |track: RemoteTrack| {
            debug!(
                "{} received {} track {} (stream {})",
                attempt,
                track.kind(),
                track.id(),
                track.stream_id()
            );
            tracks.lock().push(track.clone());
            sink(attempt, track);
        })));
    }

    /// Whether [`Session::dispose`] has been called
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Dispose the session
    ///
    /// Detaches the gathering, ICE state and track handlers before anything
    /// else, then closes the engine peer. Calling this again is a no-op.
    pub async fn dispose(&self) -> Result<()> {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        self.peer.on_ice_gathering_state_change(None);
        self.peer.on_ice_connection_state_change(None);
        self.peer.on_track(None);
        self.tracks.lock().clear();

        info!("Disposing session {} ({})", self.connection_id, self.attempt);
        self.peer.close().await
    }

    /// Byte counters of the engine peer
    pub async fn stats(&self) -> Result<SessionStats> {
        self.peer.stats().await
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("attempt", &self.attempt)
            .field("connection_id", &self.connection_id)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
