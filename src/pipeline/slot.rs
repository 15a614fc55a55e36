use std::sync::{Condvar, Mutex};
use std::time::Duration;

use crate::types::error::{ReplayError, Result};

/// Key the producer (capture/convert) side holds while it owns a slot's buffer.
pub const PRODUCER_KEY: u8 = 0;
/// Key the encoder side holds while it owns a slot's buffer.
pub const ENCODER_KEY: u8 = 1;

/// A keyed-mutex stand-in (see SPEC_FULL.md §3 for why this isn't a literal
/// GPU `IDXGIKeyedMutex`). Acquire succeeds only when the last `release` used
/// the requested key, so ownership alternates strictly between the two
/// parties sharing the buffer underneath.
pub struct KeyedMutex {
    owner: Mutex<u8>,
    cv: Condvar,
}

impl KeyedMutex {
    pub fn new(initial_owner: u8) -> Self {
        Self {
            owner: Mutex::new(initial_owner),
            cv: Condvar::new(),
        }
    }

    /// Blocks until `key` is the current owner, or `timeout` elapses.
    /// A timeout here is the pipeline's BUSY outcome, never a hard error.
    pub fn acquire(&self, key: u8, timeout: Duration) -> Result<()> {
        let guard = self.owner.lock().unwrap();
        let (_guard, wait_result) = self
            .cv
            .wait_timeout_while(guard, timeout, |owner| *owner != key)
            .unwrap();
        if wait_result.timed_out() {
            Err(ReplayError::Transient("keyed mutex acquire timed out".into()))
        } else {
            Ok(())
        }
    }

    /// Hands ownership to `new_owner` and wakes whichever side is waiting on it.
    pub fn release(&self, new_owner: u8) {
        let mut guard = self.owner.lock().unwrap();
        *guard = new_owner;
        self.cv.notify_all();
    }

    #[cfg(test)]
    pub fn current_owner(&self) -> u8 {
        *self.owner.lock().unwrap()
    }
}

/// A pending encode job, handed from `submit` to the output worker once the
/// encoder-side mutex has been acquired for a slot.
pub struct SlotJob {
    pub pts_hns: i64,
    pub duration_hns: i64,
    pub force_idr: bool,
}

/// One entry in the encode pipeline's ring (`NUM_SLOTS` of these). Holds every
/// resource needed to carry one in-flight frame from capture through to a
/// retrieved bitstream unit -- one record per index, not parallel arrays
/// (see Design Notes §9 of the spec).
pub struct Slot {
    /// Stands in for the shared GPU texture with a shared handle.
    pub buffer: Mutex<Vec<u8>>,
    pub mutex: KeyedMutex,
    pub job: Mutex<Option<SlotJob>>,
    pub job_ready: Condvar,
}

impl Slot {
    pub fn new(buffer_capacity: usize) -> Self {
        Self {
            buffer: Mutex::new(vec![0u8; buffer_capacity]),
            mutex: KeyedMutex::new(PRODUCER_KEY),
            job: Mutex::new(None),
            job_ready: Condvar::new(),
        }
    }
}
