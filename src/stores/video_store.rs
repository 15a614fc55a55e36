use std::collections::VecDeque;

use crate::stores::{StoreStats, EMERGENCY_KEEP_FRACTION};
use crate::types::units::{EncodedVideoUnit, SequenceHeader};

/// Lower bound on the configured ring capacity, regardless of how short a
/// retention window is requested.
pub const MIN_CAPACITY: usize = 240;
/// Upper bound on the configured ring capacity, regardless of how long a
/// retention window is requested.
pub const MAX_CAPACITY: usize = 7_200;

/// Rolling store of encoded video units covering the last `retention_hns`,
/// backed by a fixed-capacity ring (`MIN_CAPACITY..=MAX_CAPACITY` units).
///
/// Eviction is keyframe-aligned: the oldest unit is never dropped unless a
/// later keyframe already covers the retention window, so the store's first
/// unit is always decodable on its own (spec §4.2, invariant I-2).
pub struct VideoSampleStore {
    units: VecDeque<EncodedVideoUnit>,
    retention_hns: i64,
    capacity: usize,
    sequence_header: SequenceHeader,
}

impl VideoSampleStore {
    /// `capacity_hint` is the ideal unit count for the configured retention
    /// window (e.g. `fps * retention_seconds`); it is clamped into
    /// `MIN_CAPACITY..=MAX_CAPACITY`.
    pub fn new(retention_hns: i64, sequence_header: SequenceHeader, capacity_hint: usize) -> Self {
        Self {
            units: VecDeque::new(),
            retention_hns,
            capacity: capacity_hint.clamp(MIN_CAPACITY, MAX_CAPACITY),
            sequence_header,
        }
    }

    pub fn set_retention_hns(&mut self, retention_hns: i64) {
        self.retention_hns = retention_hns;
        self.evict_expired();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn sequence_header(&self) -> &SequenceHeader {
        &self.sequence_header
    }

    pub fn add(&mut self, unit: EncodedVideoUnit) {
        if self.units.is_empty() && !unit.is_key {
            log::warn!("video store: dropping leading non-key unit before first keyframe");
            return;
        }
        self.units.push_back(unit);
        self.evict_expired();
        if self.units.len() > self.capacity {
            self.emergency_evict();
        }
    }

    /// Drop whole-GOPs from the front until the remaining span is at or below
    /// `retention_hns`, never leaving a non-keyframe at the front.
    fn evict_expired(&mut self) {
        let Some(newest) = self.units.back() else {
            return;
        };
        let cutoff = newest.end_hns() - self.retention_hns;
        self.evict_to_cutoff(cutoff);
    }

    fn evict_to_cutoff(&mut self, cutoff: i64) {
        let mut evict_to = 0usize;
        for (i, u) in self.units.iter().enumerate() {
            if u.is_key && u.pts_hns <= cutoff {
                evict_to = i;
            } else if u.pts_hns > cutoff {
                break;
            }
        }
        if evict_to > 0 {
            self.units.drain(0..evict_to);
        }
    }

    /// Force the store down to `EMERGENCY_KEEP_FRACTION` of its configured
    /// capacity (by unit count, keeping the newest entries) when an insert
    /// would otherwise exceed `MAX_CAPACITY`-bounded storage (spec §4.2).
    /// Called automatically from `add`.
    fn emergency_evict(&mut self) {
        let target = ((self.capacity as f64) * EMERGENCY_KEEP_FRACTION) as usize;
        let before = self.units.len();
        while self.units.len() > target {
            self.units.pop_front();
        }
        while let Some(front) = self.units.front() {
            if front.is_key {
                break;
            }
            self.units.pop_front();
        }
        if self.units.len() < before {
            log::warn!(
                "video store: emergency eviction dropped {} units",
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
        self.sequence_header.len() + self.units.iter().map(|u| u.data.len()).sum::<usize>()
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

    /// A clone of every unit currently retained, oldest first, suitable for
    /// handing to a muxer. The first entry is always a keyframe.
    pub fn snapshot_for_muxing(&self) -> Vec<EncodedVideoUnit> {
        self.units.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.units.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(pts: i64, dur: i64, is_key: bool) -> EncodedVideoUnit {
        EncodedVideoUnit {
            data: vec![0u8; 10],
            pts_hns: pts,
            duration_hns: dur,
            is_key,
        }
    }

    #[test]
    fn keeps_keyframe_alignment_on_evict() {
        let mut store = VideoSampleStore::new(20, Vec::new(), MIN_CAPACITY);
        store.add(unit(0, 10, true));
        store.add(unit(10, 10, false));
        store.add(unit(20, 10, true));
        store.add(unit(30, 10, false));
        // newest end = 40, cutoff = 20; only the keyframe at pts=20 qualifies
        assert!(store.snapshot_for_muxing().first().unwrap().is_key);
        assert_eq!(store.snapshot_for_muxing().first().unwrap().pts_hns, 20);
    }

    #[test]
    fn rejects_leading_non_key_unit() {
        let mut store = VideoSampleStore::new(100, Vec::new(), MIN_CAPACITY);
        store.add(unit(0, 10, false));
        assert!(store.is_empty());
    }

    #[test]
    fn capacity_is_clamped_to_bounds() {
        let store = VideoSampleStore::new(100, Vec::new(), 1);
        assert_eq!(store.capacity(), MIN_CAPACITY);
        let store = VideoSampleStore::new(100, Vec::new(), usize::MAX);
        assert_eq!(store.capacity(), MAX_CAPACITY);
    }

    #[test]
    fn emergency_eviction_keeps_newest_fraction_and_keyframe_alignment() {
        let mut store = VideoSampleStore::new(i64::MAX, Vec::new(), MIN_CAPACITY);
        // Push far more than capacity with a keyframe every other unit so
        // eviction has a keyframe boundary to land on.
        for i in 0..(MIN_CAPACITY * 2) {
            let is_key = i % 2 == 0;
            store.add(unit(i as i64 * 10, 10, is_key));
        }
        assert!(store.len() <= MIN_CAPACITY);
        assert!(store.snapshot_for_muxing().first().unwrap().is_key);
    }
}
