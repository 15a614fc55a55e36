use serde::{Deserialize, Serialize};

use super::error::{ReplayError, Result};

/// Quality preset mapped to a constant-QP rate-control point.
///
/// `qp()`/`intra_qp()` implement the table in the spec: `{28, 24, 20, 16}`
/// for `{Low, Medium, High, Lossless}`, with `intra_qp = max(1, qp - 4)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityPreset {
    Low,
    Medium,
    High,
    Lossless,
}

impl QualityPreset {
    pub fn qp(&self) -> u32 {
        match self {
            QualityPreset::Low => 28,
            QualityPreset::Medium => 24,
            QualityPreset::High => 20,
            QualityPreset::Lossless => 16,
        }
    }

    pub fn intra_qp(&self) -> u32 {
        self.qp().saturating_sub(4).max(1)
    }

    /// Base Mbps used by `estimate_ram` (`BASE_BITRATE` in the spec's design notes).
    pub fn base_bitrate_mbps(&self) -> f64 {
        match self {
            QualityPreset::Low => 60.0,
            QualityPreset::Medium => 75.0,
            QualityPreset::High => 90.0,
            QualityPreset::Lossless => 130.0,
        }
    }
}

/// Where the capture surface comes from. The enumeration/selection mechanics
/// themselves are a capture-adapter collaborator; this only records the choice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CaptureSource {
    Monitor { index: u32 },
    Window { id: String },
    Area { x: i32, y: i32, width: u32, height: u32 },
    AllMonitors,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AspectRatio {
    Native,
    Ratio16x9,
    Ratio4x3,
    Ratio21x9,
}

/// Recognized configuration options (spec §6). Values are accepted as given
/// and clamped by `Supervisor::start`; reading the option from a file on disk
/// is a collaborator's job (not this crate's).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayConfig {
    pub replay_enabled: bool,
    pub replay_duration_seconds: u32,
    pub replay_capture_source: CaptureSource,
    pub replay_aspect_ratio: AspectRatio,
    pub replay_fps: u32,
    pub quality: QualityPreset,
    pub audio_enabled: bool,
    pub audio_sources: [Option<String>; 3],
    pub audio_volumes: [u32; 3],
    pub save_path: String,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            replay_enabled: true,
            replay_duration_seconds: 30,
            replay_capture_source: CaptureSource::Monitor { index: 0 },
            replay_aspect_ratio: AspectRatio::Native,
            replay_fps: 60,
            quality: QualityPreset::Medium,
            audio_enabled: false,
            audio_sources: [None, None, None],
            audio_volumes: [100, 100, 100],
            save_path: String::from("."),
        }
    }
}

pub const MIN_RETENTION_SECONDS: u32 = 1;
pub const MAX_RETENTION_SECONDS: u32 = 1200;
pub const MIN_FPS: u32 = 30;
pub const MAX_FPS: u32 = 240;
pub const MAX_VOLUME: u32 = 400;

impl ReplayConfig {
    /// Clamp user-supplied values into the ranges the spec requires
    /// (`replay_duration_seconds` ∈ [1, 1200], `replay_fps` ∈ [30, 240],
    /// `audio_volume*` ∈ [0, 400]).
    pub fn clamped(mut self) -> Self {
        self.replay_duration_seconds = self
            .replay_duration_seconds
            .clamp(MIN_RETENTION_SECONDS, MAX_RETENTION_SECONDS);
        self.replay_fps = self.replay_fps.clamp(MIN_FPS, MAX_FPS);
        for v in self.audio_volumes.iter_mut() {
            *v = (*v).min(MAX_VOLUME);
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(MIN_RETENTION_SECONDS..=MAX_RETENTION_SECONDS).contains(&self.replay_duration_seconds)
        {
            return Err(ReplayError::Config(format!(
                "replay_duration_seconds {} out of range",
                self.replay_duration_seconds
            )));
        }
        if !(MIN_FPS..=MAX_FPS).contains(&self.replay_fps) {
            return Err(ReplayError::Config(format!(
                "replay_fps {} out of range",
                self.replay_fps
            )));
        }
        for v in self.audio_volumes.iter() {
            if *v > MAX_VOLUME {
                return Err(ReplayError::Config(format!("audio volume {v} exceeds max")));
            }
        }
        Ok(())
    }
}
