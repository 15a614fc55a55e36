use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

/// Coordinator state machine (spec §4.3). Transitions are driven entirely by
/// the coordinator thread; other threads only read via `SupervisorControls`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Uninitialized,
    Starting,
    Capturing,
    Stopping,
    Stalled,
    Error,
}

impl SupervisorState {
    fn to_u8(self) -> u8 {
        match self {
            SupervisorState::Uninitialized => 0,
            SupervisorState::Starting => 1,
            SupervisorState::Capturing => 2,
            SupervisorState::Stopping => 3,
            SupervisorState::Stalled => 4,
            SupervisorState::Error => 5,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            1 => SupervisorState::Starting,
            2 => SupervisorState::Capturing,
            3 => SupervisorState::Stopping,
            4 => SupervisorState::Stalled,
            5 => SupervisorState::Error,
            _ => SupervisorState::Uninitialized,
        }
    }
}

/// Lock-free handle a caller can hold onto to poll supervisor state without
/// contending with the coordinator thread, mirroring the teacher's
/// `CaptureControls`.
#[derive(Debug)]
pub struct SupervisorControls {
    state: AtomicU8,
    pending_units: AtomicU64,
}

impl SupervisorControls {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(SupervisorState::Uninitialized.to_u8()),
            pending_units: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> SupervisorState {
        SupervisorState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn set_state(&self, state: SupervisorState) {
        self.state.store(state.to_u8(), Ordering::Release);
    }

    pub fn is_capturing(&self) -> bool {
        self.state() == SupervisorState::Capturing
    }

    pub(crate) fn set_pending_units(&self, n: u64) {
        self.pending_units.store(n, Ordering::Release);
    }

    pub fn pending_units(&self) -> u64 {
        self.pending_units.load(Ordering::Acquire)
    }
}

impl Default for SupervisorControls {
    fn default() -> Self {
        Self::new()
    }
}
