//! Scripted media engine

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use smartstream_webrtc::peer::{ConnectionStateHandler, GatheringStateHandler, TrackHandler};
use smartstream_webrtc::{
    Error, IceConnectionState, IceGatheringState, IceServer, MediaKind, PeerFactory, PeerHandle,
    RemoteTrack, Result, SessionDescription, SessionStats,
};

use super::CallLog;

/// How a fake peer gathers ICE candidates after the local description is set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatheringMode {
    /// Complete before `set_local_description` returns, without an event
    Immediate,
    /// Complete shortly afterwards, announced through the handler
    Async,
    /// Stay in `gathering` until [`FakePeer::complete_gathering`] is called
    Manual,
}

type SharedGatheringHandler = Arc<dyn Fn(IceGatheringState) + Send + Sync>;
type SharedConnectionHandler = Arc<dyn Fn(IceConnectionState) + Send + Sync>;
type SharedTrackHandler = Arc<dyn Fn(RemoteTrack) + Send + Sync>;

struct FakePeerInner {
    label: String,
    ice_servers: Vec<IceServer>,
    log: CallLog,
    gathering_mode: GatheringMode,

    gathering_state: Mutex<IceGatheringState>,
    connection_state: Mutex<IceConnectionState>,
    transceivers: Mutex<Vec<MediaKind>>,
    local: Mutex<Option<SessionDescription>>,
    remote: Mutex<Option<SessionDescription>>,
    stats: Mutex<SessionStats>,

    gathering_handler: Mutex<Option<SharedGatheringHandler>>,
    connection_handler: Mutex<Option<SharedConnectionHandler>>,
    track_handler: Mutex<Option<SharedTrackHandler>>,
    gathering_subscriptions: AtomicUsize,

    closed: AtomicBool,
    close_calls: AtomicUsize,
}

/// In-memory peer recording every engine call
#[derive(Clone)]
pub struct FakePeer {
    inner: Arc<FakePeerInner>,
}

impl FakePeer {
    fn new(label: String, ice_servers: Vec<IceServer>, mode: GatheringMode, log: CallLog) -> Self {
        Self {
            inner: Arc::new(FakePeerInner {
                label,
                ice_servers,
                log,
                gathering_mode: mode,
                gathering_state: Mutex::new(IceGatheringState::New),
                connection_state: Mutex::new(IceConnectionState::New),
                transceivers: Mutex::new(Vec::new()),
                local: Mutex::new(None),
                remote: Mutex::new(None),
                stats: Mutex::new(SessionStats::default()),
                gathering_handler: Mutex::new(None),
                connection_handler: Mutex::new(None),
                track_handler: Mutex::new(None),
                gathering_subscriptions: AtomicUsize::new(0),
                closed: AtomicBool::new(false),
                close_calls: AtomicUsize::new(0),
            }),
        }
    }

    fn record(&self, operation: &str) {
        self.inner.log.record(format!("{}:{}", self.inner.label, operation));
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    pub fn ice_servers(&self) -> Vec<IceServer> {
        self.inner.ice_servers.clone()
    }

    pub fn transceivers(&self) -> Vec<MediaKind> {
        self.inner.transceivers.lock().clone()
    }

    pub fn remote_description(&self) -> Option<SessionDescription> {
        self.inner.remote.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> usize {
        self.inner.close_calls.load(Ordering::SeqCst)
    }

    pub fn has_gathering_handler(&self) -> bool {
        self.inner.gathering_handler.lock().is_some()
    }

    pub fn has_connection_handler(&self) -> bool {
        self.inner.connection_handler.lock().is_some()
    }

    pub fn has_track_handler(&self) -> bool {
        self.inner.track_handler.lock().is_some()
    }

    /// True when no event handler is installed
    pub fn is_quiet(&self) -> bool {
        !self.has_gathering_handler() && !self.has_connection_handler() && !self.has_track_handler()
    }

    /// How many gathering handlers were ever installed
    pub fn gathering_subscriptions(&self) -> usize {
        self.inner.gathering_subscriptions.load(Ordering::SeqCst)
    }

    pub fn set_stats(&self, stats: SessionStats) {
        *self.inner.stats.lock() = stats;
    }

    /// Finish gathering and notify the handler, if any
    pub fn complete_gathering(&self) {
        set_gathering(&self.inner, IceGatheringState::Complete);
    }

    /// Move to `state` and notify the ICE connection handler, if any
    pub fn emit_ice_state(&self, state: IceConnectionState) {
        *self.inner.connection_state.lock() = state;
        let handler = self.inner.connection_handler.lock().clone();
        if let Some(handler) = handler {
            handler(state);
        }
    }

    /// Announce a remote track to the track handler, if any
    pub fn emit_track(&self, track: RemoteTrack) {
        let handler = self.inner.track_handler.lock().clone();
        if let Some(handler) = handler {
            handler(track);
        }
    }
}

fn set_gathering(inner: &FakePeerInner, state: IceGatheringState) {
    *inner.gathering_state.lock() = state;
    let handler = inner.gathering_handler.lock().clone();
    if let Some(handler) = handler {
        handler(state);
    }
}

#[async_trait]
impl PeerHandle for FakePeer {
    async fn add_recvonly_transceiver(&self, kind: MediaKind) -> Result<()> {
        self.record(&format!("add_recvonly_transceiver({})", kind));
        self.inner.transceivers.lock().push(kind);
        Ok(())
    }

    async fn create_offer(&self) -> Result<SessionDescription> {
        self.record("create_offer");
        let media: Vec<String> = self
            .transceivers()
            .iter()
            .map(|kind| format!("m={} 9 UDP/TLS/RTP/SAVPF 96\r\na=recvonly", kind))
            .collect();
        Ok(SessionDescription::offer(format!(
            "v=0\r\no=- {} 2 IN IP4 127.0.0.1\r\n{}\r\n",
            self.inner.label,
            media.join("\r\n")
        )))
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<()> {
        self.record("set_local_description");
        *self.inner.local.lock() = Some(desc);

        match self.inner.gathering_mode {
            GatheringMode::Immediate => {
                *self.inner.gathering_state.lock() = IceGatheringState::Complete;
            }
            GatheringMode::Async => {
                set_gathering(&self.inner, IceGatheringState::Gathering);
                let inner = Arc::clone(&self.inner);
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    set_gathering(&inner, IceGatheringState::Complete);
                });
            }
            GatheringMode::Manual => set_gathering(&self.inner, IceGatheringState::Gathering),
        }
        Ok(())
    }

    async fn local_description(&self) -> Option<SessionDescription> {
        self.inner.local.lock().clone()
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()> {
        self.record("set_remote_description");
        if self.is_closed() {
            return Err(Error::PeerConnectionError("peer is closed".to_string()));
        }
        *self.inner.remote.lock() = Some(desc);
        Ok(())
    }

    fn ice_gathering_state(&self) -> IceGatheringState {
        *self.inner.gathering_state.lock()
    }

    fn ice_connection_state(&self) -> IceConnectionState {
        *self.inner.connection_state.lock()
    }

    fn on_ice_gathering_state_change(&self, handler: Option<GatheringStateHandler>) {
        if handler.is_some() {
            self.inner.gathering_subscriptions.fetch_add(1, Ordering::SeqCst);
        }
        let handler = handler.map(SharedGatheringHandler::from);
        // Old handler dropped outside the lock
        let _previous = std::mem::replace(&mut *self.inner.gathering_handler.lock(), handler);
    }

    fn on_ice_connection_state_change(&self, handler: Option<ConnectionStateHandler>) {
        let handler = handler.map(SharedConnectionHandler::from);
        let _previous = std::mem::replace(&mut *self.inner.connection_handler.lock(), handler);
    }

    fn on_track(&self, handler: Option<TrackHandler>) {
        let handler = handler.map(SharedTrackHandler::from);
        let _previous = std::mem::replace(&mut *self.inner.track_handler.lock(), handler);
    }

    async fn stats(&self) -> Result<SessionStats> {
        Ok(*self.inner.stats.lock())
    }

    async fn close(&self) -> Result<()> {
        self.record("close");
        self.inner.close_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.closed.store(true, Ordering::SeqCst);
        *self.inner.connection_state.lock() = IceConnectionState::Closed;
        Ok(())
    }
}

/// Factory handing out [`FakePeer`]s and counting live ones
pub struct FakePeerFactory {
    log: CallLog,
    mode: Mutex<GatheringMode>,
    peers: Mutex<Vec<FakePeer>>,
    max_live: AtomicUsize,
}

impl FakePeerFactory {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            mode: Mutex::new(GatheringMode::Immediate),
            peers: Mutex::new(Vec::new()),
            max_live: AtomicUsize::new(0),
        }
    }

    /// Gathering behaviour of peers created from now on
    pub fn set_gathering_mode(&self, mode: GatheringMode) {
        *self.mode.lock() = mode;
    }

    pub fn created(&self) -> usize {
        self.peers.lock().len()
    }

    /// Peers not closed yet
    pub fn live(&self) -> usize {
        self.peers.lock().iter().filter(|p| !p.is_closed()).count()
    }

    /// Highest number of live peers right after any creation
    pub fn max_live(&self) -> usize {
        self.max_live.load(Ordering::SeqCst)
    }

    /// Peer created `index`-th (0-based)
    pub fn peer(&self, index: usize) -> FakePeer {
        self.peers.lock()[index].clone()
    }

    pub fn last(&self) -> Option<FakePeer> {
        self.peers.lock().last().cloned()
    }
}

#[async_trait]
impl PeerFactory for FakePeerFactory {
    async fn create_peer(&self, ice_servers: &[IceServer]) -> Result<Arc<dyn PeerHandle>> {
        let mode = *self.mode.lock();
        let peer = {
            let mut peers = self.peers.lock();
            let peer = FakePeer::new(
                format!("peer-{}", peers.len() + 1),
                ice_servers.to_vec(),
                mode,
                self.log.clone(),
            );
            peers.push(peer.clone());
            peer
        };
        self.max_live.fetch_max(self.live(), Ordering::SeqCst);
        peer.record("create");
        Ok(Arc::new(peer))
    }
}
