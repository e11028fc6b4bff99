//! Viewer Test Harness
//!
//! Provides in-memory collaborators for exercising the session core
//! without a network:
//! - `FakePeerFactory` / `FakePeer`: scripted media engine with controllable
//!   ICE gathering and connection state
//! - `ScriptedSignaling`: offer/answer endpoint replying from a script
//! - `RecordingRenderer` / `RecordingNotifier`: capture what the controller
//!   hands to its collaborators
//! - `CallLog`: shared, ordered trace of engine and signaling calls
//!
//! Basic usage pattern:
//!
//! 1. Create a `Viewer` (controller wired to the fakes)
//! 2. Apply a configuration through `viewer.handle`
//! 3. Drive engine events through `viewer.factory.peer(n)`
//! 4. Wait for states with `viewer.wait_for(...)` or `eventually(...)`

#![allow(dead_code)]

pub mod collaborators;
pub mod fake_peer;
pub mod signaling;

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use smartstream_webrtc::{
    ControllerDeps, ControllerHandle, ControllerState, NegotiationOptions, ReconnectionPolicy,
    SessionController, SessionNegotiator, ViewerConfig, ViewerState,
};

pub use collaborators::{RecordingNotifier, RecordingRenderer};
pub use fake_peer::{FakePeer, FakePeerFactory, GatheringMode};
pub use signaling::{Reply, ScriptedSignaling};

/// How long `eventually` and `Viewer::wait_for` wait before failing
pub const WAIT_LIMIT: Duration = Duration::from_secs(2);

/// Ordered record of calls across fakes
#[derive(Clone, Default)]
pub struct CallLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    pub fn record(&self, entry: impl Into<String>) {
        self.entries.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.entries.lock().iter().any(|e| e == entry)
    }

    /// Position of the first occurrence of `entry`
    pub fn position(&self, entry: &str) -> Option<usize> {
        self.entries.lock().iter().position(|e| e == entry)
    }
}

/// Poll `condition` until it holds or [`WAIT_LIMIT`] passes
pub async fn eventually(what: &str, condition: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + WAIT_LIMIT;
    while !condition() {
        if tokio::time::Instant::now() >= deadline {
            panic!("timed out waiting for {}", what);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Configuration with only a signaling address
pub fn config(address: &str) -> ViewerConfig {
    ViewerConfig::new().with_address(address).unwrap()
}

/// Negotiator wired to fresh fakes
pub struct NegotiatorFixture {
    pub log: CallLog,
    pub factory: Arc<FakePeerFactory>,
    pub signaling: Arc<ScriptedSignaling>,
    pub negotiator: SessionNegotiator,
}

impl NegotiatorFixture {
    pub fn new(options: NegotiationOptions) -> Self {
        let log = CallLog::default();
        let factory = Arc::new(FakePeerFactory::new(log.clone()));
        let signaling = Arc::new(ScriptedSignaling::new(log.clone()));
        let negotiator = SessionNegotiator::new(factory.clone(), signaling.clone(), options);
        Self {
            log,
            factory,
            signaling,
            negotiator,
        }
    }
}

/// Session controller wired to fresh fakes
pub struct Viewer {
    pub log: CallLog,
    pub factory: Arc<FakePeerFactory>,
    pub signaling: Arc<ScriptedSignaling>,
    pub renderer: Arc<RecordingRenderer>,
    pub notifier: Arc<RecordingNotifier>,
    pub handle: ControllerHandle,
}

impl Viewer {
    pub fn spawn() -> Self {
        Self::spawn_with(NegotiationOptions::default(), ReconnectionPolicy::default())
    }

    pub fn spawn_with(options: NegotiationOptions, policy: ReconnectionPolicy) -> Self {
        let log = CallLog::default();
        let factory = Arc::new(FakePeerFactory::new(log.clone()));
        let signaling = Arc::new(ScriptedSignaling::new(log.clone()));
        let renderer = Arc::new(RecordingRenderer::default());
        let notifier = Arc::new(RecordingNotifier::default());

        let handle = SessionController::spawn(
            ControllerDeps::new(
                factory.clone(),
                signaling.clone(),
                renderer.clone(),
                notifier.clone(),
            )
            .with_options(options)
            .with_policy(policy),
        );

        Self {
            log,
            factory,
            signaling,
            renderer,
            notifier,
            handle,
        }
    }

    /// Wait for a published state matching `predicate`
    pub async fn wait_for(&self, what: &str, predicate: impl FnMut(&ViewerState) -> bool) -> ViewerState {
        match tokio::time::timeout(WAIT_LIMIT, self.handle.wait_for(predicate)).await {
            Ok(Ok(state)) => state,
            Ok(Err(e)) => panic!("controller stopped while waiting for {}: {}", what, e),
            Err(_) => panic!(
                "timed out waiting for {} (state: {:?})",
                what,
                self.handle.state()
            ),
        }
    }

    /// Wait until attempt `n` is connected
    pub async fn connected(&self, n: u64) -> ViewerState {
        self.wait_for(&format!("attempt-{} connected", n), |s| {
            s.phase == ControllerState::Connected && s.attempt.map(|a| a.get()) == Some(n)
        })
        .await
    }
}
