//! The capture-source side of the cross-device bridge (SPEC_FULL.md §3).
//! A real implementation would own a desktop-duplication/portal session; this
//! crate defines the trait boundary and a synthetic adapter for tests and the
//! demo harness, mirroring the teacher's pattern of a narrow capture trait
//! feeding a shared frame type into the rest of the pipeline.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::error::{ReplayError, Result};
use crate::types::units::{CaptureFrame, PixelFormat};

pub trait CaptureAdapter: Send {
    /// Blocks (briefly) until the next frame is ready, or returns
    /// `ReplayError::AccessLost` if the duplication session needs to be
    /// reinitialized by the caller.
    fn next_frame(&mut self) -> Result<CaptureFrame>;

    fn reinit_duplication(&mut self) -> Result<()>;

    fn width(&self) -> u32;
    fn height(&self) -> u32;
}

/// Generates a solid-color frame that shifts hue every call, standing in for
/// a real capture source. `fail_after` simulates ACCESS_LOST after N frames
/// (0 disables), matching the capture-recovery scenario in spec.md §8.
pub struct SyntheticCaptureAdapter {
    width: u32,
    height: u32,
    frame_counter: AtomicU64,
    fail_after: u64,
    access_lost: bool,
}

impl SyntheticCaptureAdapter {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            frame_counter: AtomicU64::new(0),
            fail_after: 0,
            access_lost: false,
        }
    }

    pub fn with_fail_after(mut self, frames: u64) -> Self {
        self.fail_after = frames;
        self
    }
}

impl CaptureAdapter for SyntheticCaptureAdapter {
    fn next_frame(&mut self) -> Result<CaptureFrame> {
        if self.access_lost {
            return Err(ReplayError::AccessLost(
                "duplication session needs reinitialization".into(),
            ));
        }

        let n = self.frame_counter.fetch_add(1, Ordering::AcqRel) + 1;
        if self.fail_after != 0 && n == self.fail_after {
            self.access_lost = true;
            return Err(ReplayError::AccessLost("simulated desktop-duplication loss".into()));
        }

        let shift = (n % 255) as u8;
        let mut data = vec![0u8; (self.width * self.height * 4) as usize];
        for px in data.chunks_exact_mut(4) {
            px[0] = shift; // B
            px[1] = 255u8.saturating_sub(shift); // G
            px[2] = 128; // R
            px[3] = 255; // A
        }

        Ok(CaptureFrame {
            data,
            width: self.width,
            height: self.height,
            format: PixelFormat::Bgra8,
        })
    }

    fn reinit_duplication(&mut self) -> Result<()> {
        self.access_lost = false;
        Ok(())
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }
}
