//! Recording renderer and notifier

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use smartstream_webrtc::{AttemptId, Notice, Notifier, RemoteTrack, Renderer};

#[derive(Default)]
pub struct RecordingRenderer {
    attached: Mutex<Vec<RemoteTrack>>,
    detach_calls: AtomicUsize,
}

impl RecordingRenderer {
    pub fn attached(&self) -> Vec<RemoteTrack> {
        self.attached.lock().clone()
    }

    pub fn detach_calls(&self) -> usize {
        self.detach_calls.load(Ordering::SeqCst)
    }
}

impl Renderer for RecordingRenderer {
    fn attach_track(&self, _attempt: AttemptId, track: RemoteTrack) {
        self.attached.lock().push(track);
    }

    fn detach_all(&self) {
        self.attached.lock().clear();
        self.detach_calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().clone()
    }

    pub fn count(&self, predicate: impl Fn(&Notice) -> bool) -> usize {
        self.notices.lock().iter().filter(|n| predicate(n)).count()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.lock().push(notice);
    }
}
