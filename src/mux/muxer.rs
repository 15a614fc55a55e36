use std::path::Path;

use crate::types::error::Result;
use crate::types::units::{EncodedAudioUnit, EncodedVideoUnit, SequenceHeader};

#[derive(Debug, Clone)]
pub struct VideoConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub sequence_header: SequenceHeader,
}

#[derive(Debug, Clone)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub channels: u32,
}

/// Writes a self-contained container file out of a fixed batch of units.
/// Called once per `save()`; the muxer owns no state across calls and must
/// never leave a partial file at `path` on failure (write to a temp file,
/// rename on success).
pub trait Muxer {
    fn write_file(
        &self,
        path: &Path,
        video: &VideoConfig,
        video_units: &[EncodedVideoUnit],
    ) -> Result<()>;

    fn write_file_with_audio(
        &self,
        path: &Path,
        video: &VideoConfig,
        video_units: &[EncodedVideoUnit],
        audio: &AudioConfig,
        audio_units: &[EncodedAudioUnit],
    ) -> Result<()>;
}
