//! Behavior engine: per-frame entry point over the track history.

use serde::Serialize;
use tracing::debug;

use crate::behavior::{classify, Behavior};
use crate::config::BehaviorConfig;
use crate::detection::{Detection, TrackKey};
use crate::track_history::TrackHistory;

/// A detection with the behavior inferred for it this frame.
#[derive(Debug, Clone, Serialize)]
pub struct EnrichedDetection {
    #[serde(flatten)]
    pub detection: Detection,
    pub track: TrackKey,
    pub behavior: Behavior,
    pub movement_distance: f64,
}

/// Owns the track history; the only thing that ever mutates it.
pub struct BehaviorEngine {
    cfg: BehaviorConfig,
    history: TrackHistory,
}

impl BehaviorEngine {
    pub fn new(cfg: BehaviorConfig) -> Self {
        let history = TrackHistory::new(cfg.ttl_frames);
        Self { cfg, history }
    }

    pub fn history(&self) -> &TrackHistory {
        &self.history
    }

    /// Classify every detection of frame `frame_index`, in input order.
    pub fn update(&mut self, detections: &[Detection], frame_index: u64) -> Vec<EnrichedDetection> {
        let evicted = self.history.evict(frame_index);
        if evicted > 0 {
            debug!("Frame {}: evicted {} stale tracks", frame_index, evicted);
        }

        let mut out = Vec::with_capacity(detections.len());
        for (ordinal, det) in detections.iter().enumerate() {
            let centroid = det.bbox.centroid();
            let key = det.track_key(ordinal);

            let entry = self.history.get_or_create(key.clone(), centroid, frame_index);
            let (behavior, movement_distance) = classify(entry, det.bbox, &det.label, &self.cfg);
            entry.observe(centroid, frame_index);

            debug!(
                "Frame {}: track {} {} → {} (moved {:.1}px, still {} frames)",
                frame_index, key, det.label, behavior, movement_distance, entry.static_frame_count
            );

            out.push(EnrichedDetection {
                detection: det.clone(),
                track: key,
                behavior,
                movement_distance,
            });
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{BBox, NOT_PET_LABEL};

    fn dog(track_id: Option<i64>, cx: i32, cy: i32) -> Detection {
        Detection::new(BBox::new(cx - 20, cy - 20, cx + 20, cy + 20), 0.9, "dog", track_id)
    }

    #[test]
    fn test_empty_frame_still_evicts() {
        let mut engine = BehaviorEngine::new(BehaviorConfig { ttl_frames: 2, ..BehaviorConfig::default() });
        engine.update(&[dog(Some(1), 100, 100)], 0);
        assert_eq!(engine.history().len(), 1);

        assert!(engine.update(&[], 2).is_empty());
        assert_eq!(engine.history().len(), 1);
        assert!(engine.update(&[], 3).is_empty());
        assert!(engine.history().is_empty());
    }

    #[test]
    fn test_preserves_order_and_count() {
        let mut engine = BehaviorEngine::new(BehaviorConfig::default());
        let dets = vec![
            dog(Some(3), 100, 100),
            Detection::new(BBox::new(0, 0, 10, 10), 0.3, NOT_PET_LABEL, None),
            dog(None, 300, 300),
            dog(Some(1), 500, 100),
        ];
        let out = engine.update(&dets, 0);
        assert_eq!(out.len(), 4);
        for (o, d) in out.iter().zip(&dets) {
            assert_eq!(&o.detection, d);
        }
        assert_eq!(out[1].behavior, Behavior::Unknown);
        assert_eq!(out[1].track.to_string(), "Not Pet_1");
        assert_eq!(out[2].track.to_string(), "dog_2");
    }

    #[test]
    fn test_static_accumulation_reaches_sleeping_on_threshold_frame() {
        let cfg = BehaviorConfig::default();
        let threshold = cfg.static_frame_threshold as u64;
        let mut engine = BehaviorEngine::new(cfg);

        for frame in 0..threshold - 1 {
            let out = engine.update(&[dog(Some(1), 200, 200)], frame);
            assert_eq!(out[0].behavior, Behavior::Active, "frame {}", frame);
        }
        let out = engine.update(&[dog(Some(1), 200, 200)], threshold - 1);
        assert_eq!(out[0].behavior, Behavior::Sleeping);
    }

    #[test]
    fn test_dog_scenario() {
        let mut engine = BehaviorEngine::new(BehaviorConfig::default());

        let out = engine.update(&[dog(Some(1), 100, 100)], 0);
        assert_eq!(out[0].behavior, Behavior::Active);
        assert_eq!(out[0].movement_distance, 0.0);

        let out = engine.update(&[dog(Some(1), 101, 101)], 1);
        assert_eq!(out[0].behavior, Behavior::Active);
        assert!((out[0].movement_distance - 2f64.sqrt()).abs() < 1e-9);

        let mut last = Behavior::Active;
        for frame in 2..=30u64 {
            let jitter = (frame % 2) as i32;
            let out = engine.update(&[dog(Some(1), 100 + jitter, 100 + jitter)], frame);
            last = out[0].behavior;
        }
        assert_eq!(last, Behavior::Sleeping);

        let entry = engine.history().get(&TrackKey::Tracked(1)).unwrap();
        assert_eq!(entry.last_seen_frame, 30);
        assert_eq!(entry.static_frame_count, 31);
    }

    #[test]
    fn test_big_jump_resets_static_run() {
        let mut engine = BehaviorEngine::new(BehaviorConfig { static_frame_threshold: 2, ..BehaviorConfig::default() });
        engine.update(&[dog(Some(1), 100, 100)], 0);
        assert_eq!(engine.update(&[dog(Some(1), 100, 100)], 1)[0].behavior, Behavior::Sleeping);

        let out = engine.update(&[dog(Some(1), 200, 100)], 2);
        assert_eq!(out[0].behavior, Behavior::Running);
        assert_eq!(out[0].movement_distance, 100.0);

        assert_eq!(engine.update(&[dog(Some(1), 200, 100)], 3)[0].behavior, Behavior::Active);
    }

    #[test]
    fn test_tracks_are_independent() {
        let mut engine = BehaviorEngine::new(BehaviorConfig::default());
        engine.update(&[dog(Some(1), 100, 100), dog(Some(2), 400, 400)], 0);
        let out = engine.update(&[dog(Some(2), 400, 400), dog(Some(1), 130, 100)], 1);
        assert_eq!(out[0].behavior, Behavior::Active);
        assert_eq!(out[1].behavior, Behavior::Exploring);
    }

    #[test]
    fn test_far_off_boxes_are_classified() {
        let mut engine = BehaviorEngine::new(BehaviorConfig::default());
        let far = Detection::new(BBox::new(2_000_000_000, 0, 2_000_000_000, 10), 0.9, "dog", Some(1));
        assert_eq!(engine.update(&[far.clone()], 0)[0].behavior, Behavior::Active);
        assert_eq!(engine.update(&[far], 1)[0].movement_distance, 0.0);
    }

    #[test]
    fn test_fallback_keys_follow_list_position() {
        let mut engine = BehaviorEngine::new(BehaviorConfig::default());
        engine.update(&[dog(None, 100, 100), dog(None, 400, 400)], 0);

        // Same two dogs reported in the opposite order: history is swapped.
        let out = engine.update(&[dog(None, 400, 400), dog(None, 100, 100)], 1);
        assert_eq!(out[0].track.to_string(), "dog_0");
        assert_eq!(out[0].behavior, Behavior::Running);
        assert_eq!(out[1].behavior, Behavior::Running);
    }
}
