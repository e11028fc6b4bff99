//! Scripted signaling endpoint

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Semaphore;
use url::Url;

use smartstream_webrtc::signaling::offer_url;
use smartstream_webrtc::{Error, Result, SessionDescription, SignalingChannel};

use super::CallLog;

/// One scripted reply
#[derive(Debug, Clone)]
pub enum Reply {
    /// A well-formed answer
    Answer,
    /// An answer whose type is not `answer`
    WrongType,
    /// A signaling failure with this message
    Fail(String),
}

/// Signaling channel answering from a script
///
/// Replies are consumed in order; once the script is empty every exchange
/// gets [`Reply::Answer`]. With [`ScriptedSignaling::hold`] exchanges block
/// until permits are released.
pub struct ScriptedSignaling {
    log: CallLog,
    script: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<(Url, SessionDescription)>>,
    gate: Mutex<Option<Arc<Semaphore>>>,
}

impl ScriptedSignaling {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            gate: Mutex::new(None),
        }
    }

    /// Queue the next reply
    pub fn push(&self, reply: Reply) {
        self.script.lock().push_back(reply);
    }

    /// Let only `permits` exchanges through; the rest wait for [`release`](Self::release)
    pub fn hold(&self, permits: usize) {
        *self.gate.lock() = Some(Arc::new(Semaphore::new(permits)));
    }

    /// Let `permits` more held exchanges through
    pub fn release(&self, permits: usize) {
        if let Some(gate) = self.gate.lock().as_ref() {
            gate.add_permits(permits);
        }
    }

    /// Offer URL and offer of every exchange, in arrival order
    pub fn requests(&self) -> Vec<(Url, SessionDescription)> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl SignalingChannel for ScriptedSignaling {
    async fn exchange(
        &self,
        address: &Url,
        offer: &SessionDescription,
    ) -> Result<SessionDescription> {
        self.log.record("signaling:exchange");
        self.requests.lock().push((offer_url(address)?, offer.clone()));

        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            gate.acquire()
                .await
                .map_err(|e| Error::SignalingFailed(e.to_string()))?
                .forget();
        }

        let reply = self.script.lock().pop_front().unwrap_or(Reply::Answer);
        match reply {
            Reply::Answer => Ok(SessionDescription::answer("v=0\r\no=- producer 2 IN IP4 127.0.0.1\r\n")),
            Reply::WrongType => Ok(SessionDescription::offer("v=0\r\n")),
            Reply::Fail(message) => Err(Error::SignalingFailed(message)),
        }
    }
}
