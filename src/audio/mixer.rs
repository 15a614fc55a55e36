//! Mixes up to three volume-scaled sources into a single interleaved stereo
//! stream, chunked to a fixed byte alignment before being handed to the
//! Opus encoder (mirrors the teacher's fixed-frame-size chunking in
//! `encoders::audio`, generalized from one source to up to three).

use std::collections::VecDeque;

use ringbuf::{traits::RingBuffer, HeapRb};

use crate::audio::source::{AudioSource, TARGET_CHANNELS, TARGET_RATE};
use crate::types::config::MAX_VOLUME;
use crate::types::units::HNS_PER_SECOND;

/// Mix chunks are aligned to 4096 bytes (512 interleaved stereo f32 frames),
/// matching the encoder's frame-size granularity closely enough to avoid
/// pathological leftover buildup.
pub const CHUNK_BYTES: usize = 4096;
const BYTES_PER_FRAME: usize = TARGET_CHANNELS as usize * std::mem::size_of::<f32>();
pub const CHUNK_FRAMES: usize = CHUNK_BYTES / BYTES_PER_FRAME;

const RETAINED_SECONDS: usize = 5;

pub struct AudioMixer {
    sources: Vec<(Box<dyn AudioSource>, u32)>,
    pending: Vec<VecDeque<f32>>,
    /// Last `RETAINED_SECONDS` of mixed output, overwriting oldest samples
    /// once full (mirrors the teacher's `HeapRb`-backed frame buffers).
    mixed_ring: HeapRb<f32>,
    samples_emitted: u64,
}

impl AudioMixer {
    pub fn new() -> Self {
        let capacity = TARGET_RATE as usize * TARGET_CHANNELS as usize * RETAINED_SECONDS;
        Self {
            sources: Vec::new(),
            pending: Vec::new(),
            mixed_ring: HeapRb::new(capacity),
            samples_emitted: 0,
        }
    }

    /// `volume` is a percentage in `0..=MAX_VOLUME` (100 = unity gain).
    pub fn add_source(&mut self, source: Box<dyn AudioSource>, volume: u32) {
        self.sources.push((source, volume.min(MAX_VOLUME)));
        self.pending.push(VecDeque::new());
    }

    pub fn set_volume(&mut self, index: usize, volume: u32) {
        if let Some((_, v)) = self.sources.get_mut(index) {
            *v = volume.min(MAX_VOLUME);
        }
    }

    /// Pulls fresh samples from every source, mixes whatever full chunks are
    /// now available, and returns `(chunk, start_hns)` pairs in order.
    pub fn tick(&mut self) -> Vec<(Vec<f32>, i64)> {
        for (i, (source, _)) in self.sources.iter_mut().enumerate() {
            if let Ok(samples) = source.pull() {
                self.pending[i].extend(samples);
            }
        }

        let chunk_len = CHUNK_FRAMES * TARGET_CHANNELS as usize;
        let mut out = Vec::new();
        loop {
            if self.sources.is_empty() || self.pending.iter().any(|p| p.len() < chunk_len) {
                break;
            }
            let mut mixed = vec![0f32; chunk_len];
            for (i, (_, volume)) in self.sources.iter().enumerate() {
                let gain = *volume as f32 / 100.0;
                for (dst, src) in mixed.iter_mut().zip(self.pending[i].iter().take(chunk_len)) {
                    *dst += src * gain;
                }
            }
            for pending in self.pending.iter_mut() {
                pending.drain(..chunk_len);
            }
            let source_count = self.sources.len().max(1) as f32;
            for sample in mixed.iter_mut() {
                *sample = (*sample / source_count).clamp(-1.0, 1.0);
            }

            let start_hns = self.samples_to_hns(self.samples_emitted);
            self.samples_emitted += CHUNK_FRAMES as u64;

            for sample in mixed.iter().copied() {
                self.mixed_ring.push_overwrite(sample);
            }

            out.push((mixed, start_hns));
        }
        out
    }

    fn samples_to_hns(&self, frame_count: u64) -> i64 {
        (frame_count as i64) * HNS_PER_SECOND / TARGET_RATE as i64
    }

    pub fn current_timestamp_hns(&self) -> i64 {
        self.samples_to_hns(self.samples_emitted)
    }
}

impl Default for AudioMixer {
    fn default() -> Self {
        Self::new()
    }
}
