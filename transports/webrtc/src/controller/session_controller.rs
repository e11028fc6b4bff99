//! Session controller actor
//!
//! One tokio task owns the active [`Session`], its monitor subscription and
//! the published [`ViewerState`]. Everything else talks to it through a
//! [`ControllerHandle`]. Commands from the handle and events from sessions
//! (negotiation results, degradation, tracks) are processed one at a time,
//! which serializes teardown and startup: a new attempt never starts before
//! the previous session is disposed.

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use super::state::{ControllerState, LoadingState, ViewerState};
use crate::config::{NegotiationOptions, ViewerConfig};
use crate::ice;
use crate::media::{RemoteTrack, Renderer, RendererEvent};
use crate::notify::{Notice, Notifier};
use crate::peer::{PeerFactory, ReconnectionPolicy, SessionStats};
use crate::session::{
    AttemptId, ConnectionMonitor, DegradedSignal, Session, SessionNegotiator, Subscription,
};
use crate::signaling::SignalingChannel;
use crate::{Error, Result};

/// Collaborators and tuning for a controller
pub struct ControllerDeps {
    /// Builds engine peers
    pub factory: Arc<dyn PeerFactory>,
    /// Offer/answer exchange
    pub signaling: Arc<dyn SignalingChannel>,
    /// Playback sink for received tracks
    pub renderer: Arc<dyn Renderer>,
    /// User-facing notices
    pub notifier: Arc<dyn Notifier>,
    /// Per-attempt negotiation options
    pub options: NegotiationOptions,
    /// What to do after the link degrades
    pub policy: ReconnectionPolicy,
}

impl ControllerDeps {
    /// Collaborators with default negotiation options and the immediate
    /// reconnection policy
    pub fn new(
        factory: Arc<dyn PeerFactory>,
        signaling: Arc<dyn SignalingChannel>,
        renderer: Arc<dyn Renderer>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            factory,
            signaling,
            renderer,
            notifier,
            options: NegotiationOptions::default(),
            policy: ReconnectionPolicy::default(),
        }
    }

    /// Set the negotiation options
    pub fn with_options(mut self, options: NegotiationOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the reconnection policy
    pub fn with_policy(mut self, policy: ReconnectionPolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// Commands accepted from a [`ControllerHandle`]
enum Command {
    ApplyConfig(ViewerConfig),
    Renderer {
        attempt: AttemptId,
        event: RendererEvent,
    },
    Reconnect,
    Stats(oneshot::Sender<Option<SessionStats>>),
    Shutdown(oneshot::Sender<()>),
}

/// Events raised by sessions and timers
enum Event {
    NegotiationFinished {
        attempt: AttemptId,
        result: Result<()>,
    },
    Degraded(DegradedSignal),
    Track {
        attempt: AttemptId,
        track: RemoteTrack,
    },
    RetryDue {
        token: u64,
    },
}

/// Owns the viewing session
pub struct SessionController {
    negotiator: Arc<SessionNegotiator>,
    renderer: Arc<dyn Renderer>,
    notifier: Arc<dyn Notifier>,
    policy: ReconnectionPolicy,

    /// Configuration snapshot driving the current session
    config: ViewerConfig,

    /// Active session and its monitor subscription
    session: Option<Arc<Session>>,
    subscription: Option<Subscription>,

    /// Last attempt number handed out
    last_attempt: u64,

    /// Restarts since the last successful negotiation
    attempts_made: u32,

    /// Scheduled restarts carry this token; bumping it cancels them
    retry_token: u64,

    state_tx: watch::Sender<ViewerState>,
    events_tx: mpsc::UnboundedSender<Event>,
}

impl SessionController {
    /// Spawn the controller task and return a handle to it
    ///
    /// Must be called from within a tokio runtime. The controller starts
    /// `Idle` and does nothing until a configuration is applied.
    pub fn spawn(deps: ControllerDeps) -> ControllerHandle {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ViewerState::default());

        let controller = Self {
            negotiator: Arc::new(SessionNegotiator::new(
                deps.factory,
                deps.signaling,
                deps.options,
            )),
            renderer: deps.renderer,
            notifier: deps.notifier,
            policy: deps.policy,
            config: ViewerConfig::default(),
            session: None,
            subscription: None,
            last_attempt: 0,
            attempts_made: 0,
            retry_token: 0,
            state_tx,
            events_tx,
        };

        tokio::spawn(controller.run(commands_rx, events_rx));

        ControllerHandle {
            commands: commands_tx,
            state: state_rx,
        }
    }

    /// Main loop
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut events: mpsc::UnboundedReceiver<Event>,
    ) {
        debug!("Session controller started");

        loop {
            tokio::select! {
                biased;

                command = commands.recv() => match command {
                    Some(command) => {
                        if !self.handle_command(command).await {
                            break;
                        }
                    }
                    // Every handle dropped
                    None => {
                        self.close().await;
                        break;
                    }
                },

                Some(event) = events.recv() => self.handle_event(event).await,
            }
        }

        info!("Session controller stopped");
    }

    /// Returns `false` once the controller should stop
    async fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::ApplyConfig(config) => self.apply_config(config).await,
            Command::Renderer { attempt, event } => self.on_renderer_event(attempt, event),
            Command::Reconnect => {
                if self.config.has_address() {
                    info!("Manual reconnect requested");
                    self.attempts_made = 0;
                    self.start_negotiation().await;
                } else {
                    debug!("Ignoring reconnect: no signaling address configured");
                }
            }
            Command::Stats(reply) => {
                let stats = match &self.session {
                    Some(session) => session.stats().await.ok(),
                    None => None,
                };
                let _ = reply.send(stats);
            }
            Command::Shutdown(done) => {
                self.close().await;
                let _ = done.send(());
                return false;
            }
        }
        true
    }

    async fn handle_event(&mut self, event: Event) {
        match event {
            Event::NegotiationFinished { attempt, result } => {
                self.on_negotiation_finished(attempt, result).await
            }
            Event::Degraded(signal) => self.on_degraded(signal).await,
            Event::Track { attempt, track } => {
                if self.is_current(attempt) {
                    info!("Attaching {} track {} from {}", track.kind(), track.id(), attempt);
                    self.renderer.attach_track(attempt, track);
                } else {
                    debug!("Dropping track {} from stale {}", track.id(), attempt);
                }
            }
            Event::RetryDue { token } => {
                if token == self.retry_token && self.phase() == ControllerState::Degraded {
                    self.start_negotiation().await;
                }
            }
        }
    }

    async fn apply_config(&mut self, config: ViewerConfig) {
        let config = config.normalized();

        if let Err(e) = config.validate() {
            warn!("Rejecting configuration: {}", e);
            self.notifier
                .notify(Notice::InvalidConfiguration(e.to_string()));
            self.cancel_retry();
            self.teardown().await;
            self.config = ViewerConfig::default();
            self.publish(ControllerState::Idle, None, None);
            return;
        }

        let running = matches!(
            self.phase(),
            ControllerState::Negotiating | ControllerState::Connected | ControllerState::Degraded
        );
        if running && config == self.config {
            debug!("Configuration unchanged, keeping current session");
            return;
        }

        self.config = config;
        self.attempts_made = 0;

        if self.config.has_address() {
            self.start_negotiation().await;
        } else {
            info!("No signaling address configured, going idle");
            self.cancel_retry();
            self.teardown().await;
            self.publish(ControllerState::Idle, None, None);
        }
    }

    /// Dispose the current session and start a fresh attempt
    async fn start_negotiation(&mut self) {
        self.cancel_retry();
        self.teardown().await;

        let Some(address) = self.config.address.clone() else {
            self.publish(ControllerState::Idle, None, None);
            return;
        };

        self.last_attempt += 1;
        let attempt = AttemptId::new(self.last_attempt);
        self.publish(
            ControllerState::Negotiating,
            Some(LoadingState::Negotiating),
            Some(attempt),
        );

        let ice_servers = ice::resolve(&self.config);
        info!(
            attempt = %attempt,
            address = %address,
            ice_servers = ice_servers.len(),
            "Starting negotiation"
        );

        let session = match self.negotiator.open(attempt, &ice_servers).await {
            Ok(session) => Arc::new(session),
            Err(e) => {
                warn!("Failed to open session for {}: {}", attempt, e);
                self.notifier.notify(Notice::NegotiationFailed(e.to_string()));
                self.publish(
                    ControllerState::Negotiating,
                    Some(LoadingState::Negotiating),
                    None,
                );
                return;
            }
        };

        let events = self.events_tx.clone();
        session.route_tracks(move |attempt, track| {
            let _ = events.send(Event::Track { attempt, track });
        });

        let events = self.events_tx.clone();
        let monitor = ConnectionMonitor::new(move |signal| {
            let _ = events.send(Event::Degraded(signal));
        });
        self.subscription = Some(monitor.attach(&session));
        self.session = Some(Arc::clone(&session));

        let negotiator = Arc::clone(&self.negotiator);
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let result = negotiator.negotiate(&session, &address).await;
            let _ = events.send(Event::NegotiationFinished { attempt, result });
        });
    }

    async fn on_negotiation_finished(&mut self, attempt: AttemptId, result: Result<()>) {
        if !self.is_current(attempt) {
            debug!("Discarding result of stale {}", attempt);
            return;
        }

        match result {
            Ok(()) => {
                info!("{} connected", attempt);
                self.attempts_made = 0;
                self.publish(
                    ControllerState::Connected,
                    Some(LoadingState::Loading),
                    Some(attempt),
                );
            }
            Err(Error::SessionDisposed) => {
                debug!("{} was disposed during negotiation", attempt);
            }
            Err(e) => {
                warn!("Negotiation failed for {}: {}", attempt, e);
                self.notifier.notify(Notice::NegotiationFailed(e.to_string()));
                self.teardown().await;
                self.publish(
                    ControllerState::Negotiating,
                    Some(LoadingState::Negotiating),
                    None,
                );
            }
        }
    }

    async fn on_degraded(&mut self, signal: DegradedSignal) {
        if !self.is_current(signal.attempt) {
            debug!("Ignoring degradation of stale {}", signal.attempt);
            return;
        }

        warn!(
            attempt = %signal.attempt,
            state = ?signal.state,
            "Connection lost"
        );
        self.teardown().await;

        if !self.policy.should_retry(self.attempts_made) {
            warn!("Giving up after {} reconnection attempts", self.attempts_made);
            self.notifier.notify(Notice::ReconnectGivenUp {
                attempts: self.attempts_made,
            });
            self.publish(ControllerState::Degraded, None, None);
            return;
        }

        self.notifier.notify(Notice::ConnectionLost);
        self.publish(
            ControllerState::Degraded,
            Some(LoadingState::Negotiating),
            None,
        );

        let delay = self.policy.calculate_backoff(self.attempts_made);
        self.attempts_made += 1;

        if delay.is_zero() {
            self.start_negotiation().await;
            return;
        }

        info!(
            "Reconnecting in {:?} (attempt {})",
            delay, self.attempts_made
        );
        let token = self.retry_token;
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(Event::RetryDue { token });
        });
    }

    fn on_renderer_event(&mut self, attempt: AttemptId, event: RendererEvent) {
        let current = self.state_tx.borrow().clone();
        if current.phase != ControllerState::Connected {
            debug!("Ignoring renderer event {:?} while {}", event, current.phase);
            return;
        }
        if current.attempt != Some(attempt) {
            debug!("Ignoring renderer event {:?} from stale {}", event, attempt);
            return;
        }

        let loading = current
            .loading
            .unwrap_or(LoadingState::Loading)
            .after(event);
        if current.loading != Some(loading) {
            debug!("Renderer {:?}: loading state now {:?}", event, loading);
            self.publish(ControllerState::Connected, Some(loading), current.attempt);
        }
    }

    /// Detach the monitor, dispose the session and clear the renderer
    async fn teardown(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.detach();
        }
        if let Some(session) = self.session.take() {
            if let Err(e) = session.dispose().await {
                warn!("Failed to dispose {}: {}", session.attempt(), e);
            }
            self.renderer.detach_all();
        }
    }

    async fn close(&mut self) {
        self.cancel_retry();
        self.teardown().await;
        self.publish(ControllerState::Closed, None, None);
        info!("Session controller closed");
    }

    fn cancel_retry(&mut self) {
        self.retry_token = self.retry_token.wrapping_add(1);
    }

    fn is_current(&self, attempt: AttemptId) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| session.attempt() == attempt)
    }

    fn phase(&self) -> ControllerState {
        self.state_tx.borrow().phase
    }

    fn publish(
        &self,
        phase: ControllerState,
        loading: Option<LoadingState>,
        attempt: Option<AttemptId>,
    ) {
        let next = ViewerState {
            phase,
            loading,
            attempt,
            attempts_made: self.attempts_made,
        };
        self.state_tx.send_if_modified(|state| {
            if *state == next {
                return false;
            }
            if state.phase != next.phase {
                info!("Controller state: {} -> {}", state.phase, next.phase);
            }
            *state = next;
            true
        });
    }
}

/// Handle to a running [`SessionController`]
///
/// Cheap to clone. The controller shuts down once [`ControllerHandle::shutdown`]
/// is called or every handle is dropped.
#[derive(Clone)]
pub struct ControllerHandle {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ViewerState>,
}

impl ControllerHandle {
    /// Apply a new configuration snapshot
    ///
    /// Any running session is replaced; a snapshot without an address makes
    /// the controller idle.
    pub fn apply_config(&self, config: ViewerConfig) -> Result<()> {
        self.send(Command::ApplyConfig(config))
    }

    /// Report a renderer lifecycle notification for a track of `attempt`
    ///
    /// Events for any attempt other than the connected one are ignored.
    pub fn renderer_event(&self, attempt: AttemptId, event: RendererEvent) -> Result<()> {
        self.send(Command::Renderer { attempt, event })
    }

    /// Start a fresh attempt with the current configuration
    pub fn reconnect(&self) -> Result<()> {
        self.send(Command::Reconnect)
    }

    /// Current state snapshot
    pub fn state(&self) -> ViewerState {
        self.state.borrow().clone()
    }

    /// Subscribe to state changes
    pub fn subscribe(&self) -> watch::Receiver<ViewerState> {
        self.state.clone()
    }

    /// Wait until the published state satisfies `predicate`
    pub async fn wait_for<F>(&self, predicate: F) -> Result<ViewerState>
    where
        F: FnMut(&ViewerState) -> bool,
    {
        let mut state = self.state.clone();
        let matched = state
            .wait_for(predicate)
            .await
            .map_err(|_| Error::ControllerClosed)?;
        Ok(matched.clone())
    }

    /// Byte counters of the active session, if there is one
    pub async fn stats(&self) -> Result<Option<SessionStats>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(Command::Stats(reply_tx))?;
        reply_rx.await.map_err(|_| Error::ControllerClosed)
    }

    /// Dispose the session and stop the controller
    pub async fn shutdown(&self) -> Result<()> {
        let (done_tx, done_rx) = oneshot::channel();
        self.send(Command::Shutdown(done_tx))?;
        done_rx.await.map_err(|_| Error::ControllerClosed)
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| Error::ControllerClosed)
    }
}
