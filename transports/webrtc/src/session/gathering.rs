//! ICE gathering barrier

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::debug;

use crate::peer::{IceGatheringState, PeerHandle};
use crate::{Error, Result};

/// Wait until `peer` has finished gathering ICE candidates
///
/// Returns at once if gathering is already complete. Otherwise installs a
/// one-shot gathering handler, waits for `complete` and clears the handler
/// again whatever the outcome.
///
/// # Errors
///
/// * [`Error::IceGatheringStalled`] if `timeout` elapses first
/// * [`Error::SessionDisposed`] if the handler is cleared from elsewhere
///   (the session was disposed) before gathering completes
pub async fn wait_for_gathering_complete(
    peer: &dyn PeerHandle,
    timeout: Option<Duration>,
) -> Result<()> {
    if peer.ice_gathering_state() == IceGatheringState::Complete {
        return Ok(());
    }

    let (done_tx, done_rx) = oneshot::channel::<()>();
    let slot = Arc::new(Mutex::new(Some(done_tx)));

    let handler_slot = Arc::clone(&slot);
    peer.on_ice_gathering_state_change(Some(Box::new(move |state: IceGatheringState| {
        debug!("ICE gathering state: {:?}", state);
        if state == IceGatheringState::Complete {
            if let Some(done) = handler_slot.lock().take() {
                let _ = done.send(());
            }
        }
    })));

    // Completion may have landed between the first check and subscribing
    if peer.ice_gathering_state() == IceGatheringState::Complete {
        if let Some(done) = slot.lock().take() {
            let _ = done.send(());
        }
    }
    // Only the handler may keep the sender alive from here on
    drop(slot);

    let outcome = match timeout {
        Some(limit) => match tokio::time::timeout(limit, done_rx).await {
            Ok(received) => received.map_err(|_| Error::SessionDisposed),
            Err(_) => Err(Error::IceGatheringStalled(limit)),
        },
        None => done_rx.await.map_err(|_| Error::SessionDisposed),
    };

    peer.on_ice_gathering_state_change(None);
    outcome
}
