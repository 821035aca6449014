//! Per-track memory with frame-based TTL eviction.

use std::collections::HashMap;

use tracing::debug;

use crate::detection::TrackKey;

/// What we remember about one track between frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackEntry {
    pub last_centroid: (i32, i32),
    /// Consecutive frames with movement below the motion threshold.
    pub static_frame_count: u32,
    pub last_seen_frame: u64,
}

impl TrackEntry {
    fn new(centroid: (i32, i32), frame_index: u64) -> Self {
        Self {
            last_centroid: centroid,
            static_frame_count: 0,
            last_seen_frame: frame_index,
        }
    }

    /// Record the observation made in `frame_index`.
    pub fn observe(&mut self, centroid: (i32, i32), frame_index: u64) {
        self.last_centroid = centroid;
        self.last_seen_frame = frame_index;
    }
}

pub struct TrackHistory {
    entries: HashMap<TrackKey, TrackEntry>,
    ttl_frames: u64,
}

impl TrackHistory {
    pub fn new(ttl_frames: u64) -> Self {
        Self { entries: HashMap::new(), ttl_frames }
    }

    /// Drop entries not seen for more than `ttl_frames` frames.
    /// Returns how many were removed.
    pub fn evict(&mut self, current_frame: u64) -> usize {
        let ttl = self.ttl_frames;
        let before = self.entries.len();
        self.entries.retain(|key, entry| {
            let keep = current_frame.saturating_sub(entry.last_seen_frame) <= ttl;
            if !keep {
                debug!("Track {} evicted (last seen frame {})", key, entry.last_seen_frame);
            }
            keep
        });
        before - self.entries.len()
    }

    pub fn get_or_create(
        &mut self,
        key: TrackKey,
        centroid: (i32, i32),
        current_frame: u64,
    ) -> &mut TrackEntry {
        self.entries
            .entry(key)
            .or_insert_with(|| TrackEntry::new(centroid, current_frame))
    }

    pub fn get(&self, key: &TrackKey) -> Option<&TrackEntry> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &TrackKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(id: i64) -> TrackKey {
        TrackKey::Tracked(id)
    }

    #[test]
    fn test_ttl_boundary() {
        let mut history = TrackHistory::new(100);
        history.get_or_create(key(1), (10, 10), 10);

        assert_eq!(history.evict(110), 0);
        assert!(history.contains(&key(1)));

        assert_eq!(history.evict(111), 1);
        assert!(!history.contains(&key(1)));
    }

    #[test]
    fn test_evict_is_idempotent() {
        let mut history = TrackHistory::new(5);
        history.get_or_create(key(1), (0, 0), 0);
        history.get_or_create(key(2), (0, 0), 8);

        assert_eq!(history.evict(9), 1);
        assert_eq!(history.evict(9), 0);
        assert_eq!(history.len(), 1);
        assert!(history.contains(&key(2)));
    }

    #[test]
    fn test_get_or_create_keeps_existing() {
        let mut history = TrackHistory::new(100);
        {
            let entry = history.get_or_create(key(1), (5, 5), 0);
            assert_eq!(entry.static_frame_count, 0);
            entry.static_frame_count = 4;
        }
        let entry = history.get_or_create(key(1), (50, 50), 1);
        assert_eq!(entry.static_frame_count, 4);
        assert_eq!(entry.last_centroid, (5, 5));
    }

    #[test]
    fn test_backwards_frame_index_keeps_entries() {
        let mut history = TrackHistory::new(1);
        history.get_or_create(key(1), (0, 0), 50);
        assert_eq!(history.evict(0), 0);
        assert!(!history.is_empty());
    }
}
