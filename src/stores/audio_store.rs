use std::collections::VecDeque;

use crate::stores::{StoreStats, EMERGENCY_KEEP_FRACTION};
use crate::types::units::EncodedAudioUnit;

/// Starting capacity for the internal ring before it grows.
const INITIAL_CAPACITY: usize = 256;
/// Hard ceiling on buffered audio units, regardless of configured retention.
pub const MAX_AUDIO_SAMPLES: usize = 4_096;

/// Rolling store of encoded (mixed) audio units covering the last
/// `retention_hns`. Unlike video there is no keyframe constraint, so plain
/// time-based eviction from the front is enough in the common case; capacity
/// grows geometrically (×2) up to `MAX_AUDIO_SAMPLES`, past which an
/// emergency eviction sheds the oldest units (spec lines 139-140).
pub struct AudioSampleStore {
    units: VecDeque<EncodedAudioUnit>,
    retention_hns: i64,
    capacity: usize,
}

impl AudioSampleStore {
    pub fn new(retention_hns: i64) -> Self {
        Self {
            units: VecDeque::new(),
            retention_hns,
            capacity: INITIAL_CAPACITY,
        }
    }

    pub fn set_retention_hns(&mut self, retention_hns: i64) {
        self.retention_hns = retention_hns;
        self.evict_expired();
    }

    pub fn add(&mut self, unit: EncodedAudioUnit) {
        self.units.push_back(unit);
        self.evict_expired();
        if self.units.len() > self.capacity {
            if self.capacity < MAX_AUDIO_SAMPLES {
                self.capacity = (self.capacity * 2).min(MAX_AUDIO_SAMPLES);
            }
            if self.units.len() > self.capacity {
                self.emergency_evict();
            }
        }
    }

    fn evict_expired(&mut self) {
        let Some(newest) = self.units.back() else {
            return;
        };
        let cutoff = newest.end_hns() - self.retention_hns;
        while let Some(front) = self.units.front() {
            if front.pts_hns < cutoff {
                self.units.pop_front();
            } else {
                break;
            }
        }
    }

    /// Drop oldest units from the head until only `EMERGENCY_KEEP_FRACTION`
    /// of the (maxed-out) capacity remains, once geometric growth can no
    /// longer keep up with the incoming rate.
    fn emergency_evict(&mut self) {
        let target = ((self.capacity as f64) * EMERGENCY_KEEP_FRACTION) as usize;
        let before = self.units.len();
        while self.units.len() > target {
            self.units.pop_front();
        }
        if self.units.len() < before {
            log::warn!(
                "audio store: emergency eviction dropped {} units",
                before - self.units.len()
            );
        }
    }

    pub fn duration_hns(&self) -> i64 {
        match (self.units.front(), self.units.back()) {
            (Some(first), Some(last)) => last.end_hns() - first.pts_hns,
            _ => 0,
        }
    }

    pub fn memory_usage(&self) -> usize {
        self.units.iter().map(|u| u.data.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            unit_count: self.units.len(),
            duration_hns: self.duration_hns(),
            memory_bytes: self.memory_usage(),
        }
    }

    pub fn snapshot_for_muxing(&self) -> Vec<EncodedAudioUnit> {
        self.units.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.units.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(pts: i64, dur: i64) -> EncodedAudioUnit {
        EncodedAudioUnit {
            data: vec![0u8; 8],
            pts_hns: pts,
            duration_hns: dur,
        }
    }

    #[test]
    fn evicts_past_retention_window() {
        let mut store = AudioSampleStore::new(15);
        store.add(unit(0, 10));
        store.add(unit(10, 10));
        store.add(unit(20, 10));
        // newest end = 30, cutoff = 15; units starting before pts=15 are evicted
        assert_eq!(store.len(), 1);
        assert_eq!(store.snapshot_for_muxing()[0].pts_hns, 20);
    }

    #[test]
    fn capacity_grows_geometrically_up_to_ceiling() {
        let mut store = AudioSampleStore::new(i64::MAX);
        assert_eq!(store.capacity, INITIAL_CAPACITY);
        for i in 0..(INITIAL_CAPACITY + 1) {
            store.add(unit(i as i64 * 10, 10));
        }
        assert_eq!(store.capacity, INITIAL_CAPACITY * 2);
        assert_eq!(store.len(), INITIAL_CAPACITY + 1);
    }

    #[test]
    fn emergency_eviction_caps_at_max_samples() {
        let mut store = AudioSampleStore::new(i64::MAX);
        for i in 0..(MAX_AUDIO_SAMPLES * 2) {
            store.add(unit(i as i64 * 10, 10));
        }
        assert_eq!(store.capacity, MAX_AUDIO_SAMPLES);
        assert!(store.len() <= MAX_AUDIO_SAMPLES);
    }
}
