//! SmartStream viewer binary entry point
//!
//! Negotiates a receive-only WebRTC session with a producer through its HTTP
//! signaling endpoint, logs received media and transfer counters, and
//! renegotiates whenever the link drops.
//!
//! # Usage
//!
//! ```bash
//! # Connect to a signaling server with a public STUN server
//! cargo run --bin smartstream_viewer -- \
//!   --address https://sig.example/ \
//!   --stun stun:stun.l.google.com:19302
//!
//! # Load a saved configuration snapshot, relay through TURN
//! cargo run --bin smartstream_viewer -- \
//!   --config ./viewer.json \
//!   --turn-url turn:turn.example.com:3478 \
//!   --turn-username viewer --turn-password secret
//!
//! # Bounded exponential reconnection instead of immediate retry
//! cargo run --bin smartstream_viewer -- \
//!   --address http://localhost:8080/ \
//!   --reconnect exponential --max-reconnect-attempts 5
//! ```

use anyhow::Context;
use clap::Parser;
use parking_lot::Mutex;
use smartstream_webrtc::{
    AttemptId, ControllerDeps, ControllerHandle, HttpSignaling, NegotiationOptions, ReconnectionPolicy,
    RemoteTrack, Renderer, RendererEvent, SessionController, TracingNotifier, ViewerConfig,
    WebRtcPeerFactory,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// No RTP for this long counts as a stall
const STALL_TIMEOUT: Duration = Duration::from_secs(2);

/// SmartStream Viewer
///
/// Receive-only WebRTC viewer with automatic reconnection.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Signaling server base URL; the offer is posted to {address}/offer
    #[arg(short, long, env = "SMARTSTREAM_ADDRESS")]
    address: Option<String>,

    /// STUN server URL (stun: or stuns:)
    #[arg(long, env = "SMARTSTREAM_STUN")]
    stun: Option<String>,

    /// TURN server URL (turn: or turns:)
    #[arg(long, env = "SMARTSTREAM_TURN_URL")]
    turn_url: Option<String>,

    /// TURN username
    #[arg(long, env = "SMARTSTREAM_TURN_USERNAME")]
    turn_username: Option<String>,

    /// TURN password
    #[arg(long, env = "SMARTSTREAM_TURN_PASSWORD", hide_env_values = true)]
    turn_password: Option<String>,

    /// JSON configuration snapshot ({"address", "stun", "turn": {...}});
    /// flags override its fields
    #[arg(short, long, env = "SMARTSTREAM_CONFIG")]
    config: Option<PathBuf>,

    /// Also receive audio
    #[arg(long, default_value_t = false, env = "SMARTSTREAM_RECEIVE_AUDIO")]
    receive_audio: bool,

    /// Upper bound on the ICE gathering wait in milliseconds (0 waits indefinitely)
    #[arg(long, default_value_t = 5000, env = "SMARTSTREAM_ICE_GATHERING_TIMEOUT")]
    ice_gathering_timeout_ms: u64,

    /// Signaling request timeout in milliseconds
    #[arg(long, default_value_t = 10000, env = "SMARTSTREAM_SIGNALING_TIMEOUT")]
    signaling_timeout_ms: u64,

    /// Reconnection strategy after the link drops
    #[arg(long, value_enum, default_value = "immediate", env = "SMARTSTREAM_RECONNECT")]
    reconnect: ReconnectArg,

    /// Give up after this many consecutive reconnection attempts
    #[arg(long, env = "SMARTSTREAM_MAX_RECONNECT_ATTEMPTS")]
    max_reconnect_attempts: Option<u32>,

    /// Transfer counter logging interval in seconds (0 disables)
    #[arg(long, default_value_t = 1, env = "SMARTSTREAM_STATS_INTERVAL")]
    stats_interval_secs: u64,
}

/// Reconnection strategy CLI argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum ReconnectArg {
    /// Renegotiate at once, without limit
    Immediate,
    /// Exponential backoff with jitter
    Exponential,
}

/// Build the configuration snapshot from the optional file and CLI overrides
fn build_config_from_args(args: &Args) -> anyhow::Result<ViewerConfig> {
    let mut config = match &args.config {
        Some(path) => ViewerConfig::from_json_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => ViewerConfig::default(),
    };

    if let Some(address) = args.address.as_deref().filter(|a| !a.trim().is_empty()) {
        config = config.with_address(address)?;
    }
    if let Some(stun) = &args.stun {
        config.stun = Some(stun.clone());
    }
    if let Some(url) = &args.turn_url {
        config.turn.url = Some(url.clone());
    }
    if let Some(username) = &args.turn_username {
        config.turn.username = Some(username.clone());
    }
    if let Some(password) = &args.turn_password {
        config.turn.password = Some(password.clone());
    }

    Ok(config.normalized())
}

fn build_options_from_args(args: &Args) -> NegotiationOptions {
    let gathering_timeout = match args.ice_gathering_timeout_ms {
        0 => None,
        ms => Some(Duration::from_millis(ms)),
    };
    NegotiationOptions {
        signaling_timeout_ms: args.signaling_timeout_ms,
        ..Default::default()
    }
    .with_audio(args.receive_audio)
    .with_ice_gathering_timeout(gathering_timeout)
}

fn build_policy_from_args(args: &Args) -> ReconnectionPolicy {
    let policy = match args.reconnect {
        ReconnectArg::Immediate => ReconnectionPolicy::immediate(),
        ReconnectArg::Exponential => ReconnectionPolicy::exponential(),
    };
    match args.max_reconnect_attempts {
        Some(max) => policy.with_max_attempts(Some(max)),
        None => policy,
    }
}

/// Renderer that drains RTP from received tracks and logs progress
///
/// Reports `playing` on the first packet and `waiting` when packets stop
/// arriving for [`STALL_TIMEOUT`].
struct LoggingRenderer {
    events: mpsc::UnboundedSender<(AttemptId, RendererEvent)>,
    readers: Mutex<Vec<JoinHandle<()>>>,
}

impl LoggingRenderer {
    fn new(events: mpsc::UnboundedSender<(AttemptId, RendererEvent)>) -> Self {
        Self {
            events,
            readers: Mutex::new(Vec::new()),
        }
    }
}

impl Renderer for LoggingRenderer {
    fn attach_track(&self, attempt: AttemptId, track: RemoteTrack) {
        info!(
            attempt = %attempt,
            track_id = %track.id(),
            stream_id = %track.stream_id(),
            kind = %track.kind(),
            "Track attached"
        );

        let Some(remote) = track.remote().cloned() else {
            warn!("Track {} has no engine handle, nothing to read", track.id());
            return;
        };

        let events = self.events.clone();
        let _ = events.send((attempt, RendererEvent::Loaded));

        let reader = tokio::spawn(async move {
            let mut playing = false;
            let mut packets: u64 = 0;
            let mut payload_bytes: u64 = 0;

            loop {
                match tokio::time::timeout(STALL_TIMEOUT, remote.read_rtp()).await {
                    Ok(Ok((packet, _attributes))) => {
                        packets += 1;
                        payload_bytes += packet.payload.len() as u64;
                        if !playing {
                            playing = true;
                            info!("First {} packet received on {}", track.kind(), track.id());
                            let _ = events.send((attempt, RendererEvent::Playing));
                        }
                    }
                    Ok(Err(e)) => {
                        debug!("Track {} ended: {}", track.id(), e);
                        break;
                    }
                    Err(_) => {
                        if playing {
                            playing = false;
                            warn!("No media on {} for {:?}", track.id(), STALL_TIMEOUT);
                            let _ = events.send((attempt, RendererEvent::Waiting));
                        }
                    }
                }
            }

            info!(
                track_id = %track.id(),
                packets,
                payload_bytes,
                "Track reader finished"
            );
        });

        self.readers.lock().push(reader);
    }

    fn detach_all(&self) {
        for reader in self.readers.lock().drain(..) {
            reader.abort();
        }
    }
}

fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Set up Ctrl+C handler at the very start
    let shutdown_flag = Arc::new(AtomicBool::new(false));
    let shutdown_flag_handler = Arc::clone(&shutdown_flag);

    ctrlc::set_handler(move || {
        let was_already_set = shutdown_flag_handler.swap(true, Ordering::SeqCst);
        if was_already_set {
            eprintln!("Shutdown already in progress, forcing immediate exit");
            std::process::exit(0);
        }
        eprintln!("\nCtrl+C received, shutting down...");
    })
    .context("Failed to set Ctrl+C handler")?;

    // Create multi-threaded tokio runtime
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(num_cpus::get())
        .thread_name("viewer-worker")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(args, shutdown_flag))
}

async fn async_main(args: Args, shutdown_flag: Arc<AtomicBool>) -> anyhow::Result<()> {
    // Initialize tracing (logging)
    init_tracing();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "SmartStream viewer starting"
    );

    let config = build_config_from_args(&args)?;
    config.validate()?;
    let options = build_options_from_args(&args);
    let policy = build_policy_from_args(&args);

    info!(
        address = ?config.address.as_ref().map(|a| a.as_str()),
        stun = ?config.stun,
        turn = ?config.turn.url,
        receive_audio = options.receive_audio,
        ice_gathering_timeout = ?options.ice_gathering_timeout(),
        max_reconnect_attempts = ?policy.max_attempts,
        "Configuration loaded"
    );

    let (renderer_tx, mut renderer_rx) = mpsc::unbounded_channel();
    let renderer = Arc::new(LoggingRenderer::new(renderer_tx));
    let signaling = HttpSignaling::new(options.signaling_timeout())?;

    let handle = SessionController::spawn(
        ControllerDeps::new(
            Arc::new(WebRtcPeerFactory),
            Arc::new(signaling),
            renderer,
            Arc::new(TracingNotifier),
        )
        .with_options(options)
        .with_policy(policy),
    );

    // Forward renderer notifications to the controller
    let forward_handle = handle.clone();
    tokio::spawn(async move {
        while let Some((attempt, event)) = renderer_rx.recv().await {
            if forward_handle.renderer_event(attempt, event).is_err() {
                break;
            }
        }
    });

    // Log every published state
    let mut states = handle.subscribe();
    tokio::spawn(async move {
        while states.changed().await.is_ok() {
            let state = states.borrow_and_update().clone();
            info!(
                phase = %state.phase,
                loading = ?state.loading,
                attempt = ?state.attempt.map(|a| a.to_string()),
                attempts_made = state.attempts_made,
                "Viewer state"
            );
        }
    });

    if args.stats_interval_secs > 0 {
        spawn_stats_logger(
            handle.clone(),
            Duration::from_secs(args.stats_interval_secs),
            Arc::clone(&shutdown_flag),
        );
    }

    if !config.has_address() {
        warn!("No signaling address configured; the viewer stays idle");
    }
    handle.apply_config(config)?;

    info!("Viewer running. Press Ctrl+C to shutdown.");

    while !shutdown_flag.load(Ordering::SeqCst) {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    info!("Shutdown signal received, cleaning up...");
    handle.shutdown().await?;
    info!("Viewer shut down gracefully");

    Ok(())
}

/// Periodically log download/upload counters of the active session
fn spawn_stats_logger(handle: ControllerHandle, every: Duration, shutdown_flag: Arc<AtomicBool>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        let mut last_received = 0u64;

        loop {
            interval.tick().await;
            if shutdown_flag.load(Ordering::SeqCst) {
                break;
            }

            match handle.stats().await {
                Ok(Some(stats)) => {
                    let rate = stats.bytes_received.saturating_sub(last_received) as f64
                        / every.as_secs_f64();
                    last_received = stats.bytes_received;
                    info!(
                        event = "transfer",
                        download_bytes = stats.bytes_received,
                        upload_bytes = stats.bytes_sent,
                        download_rate_bps = (rate * 8.0) as u64,
                        "Transfer counters"
                    );
                }
                Ok(None) => last_received = 0,
                Err(_) => break,
            }
        }
    });
}

fn init_tracing() {
    // Initialize tracing with EnvFilter for RUST_LOG support
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
