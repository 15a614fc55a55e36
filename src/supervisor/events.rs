use std::path::PathBuf;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use crossbeam::channel::{unbounded, Receiver, Sender};

use crate::types::error::Result;

/// Level-triggered signal: once `set`, stays set until `clear`. Used for
/// `ready` (coordinator has produced at least one unit) and `stop`
/// (terminal, never cleared again).
pub struct ManualResetEvent {
    state: Mutex<bool>,
    cv: Condvar,
}

impl ManualResetEvent {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(false),
            cv: Condvar::new(),
        }
    }

    pub fn set(&self) {
        let mut guard = self.state.lock().unwrap();
        *guard = true;
        self.cv.notify_all();
    }

    pub fn clear(&self) {
        *self.state.lock().unwrap() = false;
    }

    pub fn is_set(&self) -> bool {
        *self.state.lock().unwrap()
    }

    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let guard = self.state.lock().unwrap();
        let (guard, _) = self
            .cv
            .wait_timeout_while(guard, timeout, |set| !*set)
            .unwrap();
        *guard
    }
}

impl Default for ManualResetEvent {
    fn default() -> Self {
        Self::new()
    }
}

/// One `save()` request, with a one-shot reply channel carrying either the
/// written path or a `SaveRejected`/`SaveFailed` error -- the `save_complete`
/// signal from spec §4.3.
pub struct SaveRequest {
    pub path: PathBuf,
    pub reply: Sender<Result<PathBuf>>,
}

/// The four signals in spec.md §4.3, bundled for convenience: `ready`,
/// `stop` (both manual-reset), and the `save_request`/`save_complete`
/// request-response pair (auto-reset by construction: each request carries
/// its own one-shot reply channel).
pub struct SupervisorEvents {
    pub ready: ManualResetEvent,
    pub stop: ManualResetEvent,
    save_tx: Sender<SaveRequest>,
    save_rx: Receiver<SaveRequest>,
}

impl SupervisorEvents {
    pub fn new() -> Self {
        let (save_tx, save_rx) = unbounded();
        Self {
            ready: ManualResetEvent::new(),
            stop: ManualResetEvent::new(),
            save_tx,
            save_rx,
        }
    }

    pub fn save_sender(&self) -> Sender<SaveRequest> {
        self.save_tx.clone()
    }

    pub fn save_receiver(&self) -> &Receiver<SaveRequest> {
        &self.save_rx
    }
}

impl Default for SupervisorEvents {
    fn default() -> Self {
        Self::new()
    }
}
