//! Audio input sources. The real capture backends (process loopback, mic,
//! etc.) are a host-integration concern; this crate only needs something
//! that produces timestamped PCM chunks at a known rate, so tests and the
//! demo harness use a synthetic generator grounded on the same
//! push/pull-by-timestamp shape the teacher's `capture::audio` module uses.

use crate::types::error::Result;

/// A source of interleaved PCM chunks. Implementors own their own resampling
/// to `TARGET_RATE`/`TARGET_CHANNELS`; `AudioMixer` assumes all sources are
/// already in that format.
pub trait AudioSource: Send {
    /// Pull whatever is currently available, or an empty vec if nothing new.
    /// Each call should make forward progress; it is polled on a fixed tick.
    fn pull(&mut self) -> Result<Vec<f32>>;
}

pub const TARGET_RATE: u32 = 48_000;
pub const TARGET_CHANNELS: u32 = 2;

/// Linear-interpolation resampler between arbitrary source rates and
/// `TARGET_RATE`, used by sources whose native capture rate differs.
pub struct LinearResampler {
    source_rate: u32,
    channels: u32,
    position: f64,
    tail: Vec<f32>,
}

impl LinearResampler {
    pub fn new(source_rate: u32, channels: u32) -> Self {
        Self {
            source_rate,
            channels,
            position: 0.0,
            tail: Vec::new(),
        }
    }

    pub fn resample(&mut self, input: &[f32]) -> Vec<f32> {
        if self.source_rate == TARGET_RATE {
            return input.to_vec();
        }
        let channels = self.channels as usize;
        if channels == 0 || input.len() < channels {
            return Vec::new();
        }

        let mut samples = std::mem::take(&mut self.tail);
        samples.extend_from_slice(input);
        let frame_count = samples.len() / channels;
        if frame_count < 2 {
            self.tail = samples;
            return Vec::new();
        }

        let ratio = self.source_rate as f64 / TARGET_RATE as f64;
        let mut out = Vec::new();
        while self.position < (frame_count - 1) as f64 {
            let idx = self.position as usize;
            let frac = self.position - idx as f64;
            for c in 0..channels {
                let a = samples[idx * channels + c];
                let b = samples[(idx + 1) * channels + c];
                out.push(a + (b - a) * frac as f32);
            }
            self.position += ratio;
        }

        let consumed_frames = self.position as usize;
        self.position -= consumed_frames as f64;
        self.tail = samples[consumed_frames.min(frame_count) * channels..].to_vec();
        out
    }
}

/// Waveform shape for `SyntheticAudioSource`, used by tests and demos in
/// place of a real capture backend.
#[derive(Debug, Clone, Copy)]
pub enum SyntheticWaveform {
    Silence,
    Sine { frequency_hz: f32 },
}

/// Deterministic PCM generator at an arbitrary native rate, resampled to
/// `TARGET_RATE` via `LinearResampler` so it can feed `AudioMixer` directly.
pub struct SyntheticAudioSource {
    waveform: SyntheticWaveform,
    native_rate: u32,
    phase: f32,
    chunk_frames: usize,
    resampler: LinearResampler,
}

impl SyntheticAudioSource {
    pub fn new(waveform: SyntheticWaveform, native_rate: u32, chunk_frames: usize) -> Self {
        Self {
            waveform,
            native_rate,
            phase: 0.0,
            chunk_frames,
            resampler: LinearResampler::new(native_rate, TARGET_CHANNELS),
        }
    }
}

impl AudioSource for SyntheticAudioSource {
    fn pull(&mut self) -> Result<Vec<f32>> {
        let mut native = Vec::with_capacity(self.chunk_frames * TARGET_CHANNELS as usize);
        match self.waveform {
            SyntheticWaveform::Silence => {
                native.resize(self.chunk_frames * TARGET_CHANNELS as usize, 0.0);
            }
            SyntheticWaveform::Sine { frequency_hz } => {
                let step = std::f32::consts::TAU * frequency_hz / self.native_rate as f32;
                for _ in 0..self.chunk_frames {
                    let sample = self.phase.sin() * 0.25;
                    for _ in 0..TARGET_CHANNELS {
                        native.push(sample);
                    }
                    self.phase += step;
                    if self.phase > std::f32::consts::TAU {
                        self.phase -= std::f32::consts::TAU;
                    }
                }
            }
        }
        Ok(self.resampler.resample(&native))
    }
}
