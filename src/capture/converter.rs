//! Converts a captured surface into the encoder's preferred pixel format,
//! standing in for the format-B conversion step of the cross-device bridge
//! (SPEC_FULL.md §3, §7). A real converter would run a GPU video processor;
//! this crate ships one reference implementation sufficient to drive the
//! pipeline in tests without one.

use crate::types::error::Result;
use crate::types::units::{CaptureFrame, ConvertedFrame, PixelFormat};

pub trait ColorConverter: Send {
    fn convert(&mut self, frame: &CaptureFrame) -> Result<ConvertedFrame>;
}

/// Reinterprets the captured bytes byte-for-byte as the encoder's pixel
/// format without doing any real colorspace math. Good enough to exercise
/// the pipeline end-to-end; not a substitute for a real BGRA->NV12 convert.
pub struct PassthroughConverter;

impl PassthroughConverter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PassthroughConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl ColorConverter for PassthroughConverter {
    fn convert(&mut self, frame: &CaptureFrame) -> Result<ConvertedFrame> {
        let target_len = (frame.width as usize) * (frame.height as usize) * 3 / 2;
        let mut data = frame.data.clone();
        data.resize(target_len, 0);
        Ok(ConvertedFrame {
            data,
            width: frame.width,
            height: frame.height,
            format: PixelFormat::Nv12,
        })
    }
}
