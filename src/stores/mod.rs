pub mod audio_store;
pub mod video_store;

pub use audio_store::AudioSampleStore;
pub use video_store::VideoSampleStore;

/// Stats surfaced by `Supervisor::status` (spec §6).
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreStats {
    pub unit_count: usize,
    pub duration_hns: i64,
    pub memory_bytes: usize,
}

/// Fraction of a store's capacity kept (by unit count, newest-first) when an
/// emergency eviction fires because memory pressure outran the configured
/// retention (spec §4.2).
pub const EMERGENCY_KEEP_FRACTION: f64 = 0.75;
