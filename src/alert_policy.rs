//! Cooldown gate deciding whether a frame's detections fire an alert.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::behavior::Behavior;
use crate::config::AlertsConfig;
use crate::detection::BBox;
use crate::engine::EnrichedDetection;

/// A notification-worthy observation, handed to the alert transports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertEvent {
    pub pet_label: String,
    pub behavior: Behavior,
    pub bbox: BBox,
    pub track: String,
    pub frame_index: u64,
    pub fired_at: DateTime<Utc>,
}

impl AlertEvent {
    pub fn message(&self) -> String {
        match self.behavior {
            Behavior::NearFood => format!("{} near food at frame {}", self.pet_label, self.frame_index),
            other => format!("{} detected {} (frame {})", self.pet_label, other, self.frame_index),
        }
    }
}

/// One cooldown window shared by all tracks. Create one policy per camera to
/// get independent windows.
pub struct AlertPolicy {
    watched: HashSet<Behavior>,
    cooldown: Duration,
    last_alert: Option<Instant>,
}

impl AlertPolicy {
    pub fn new(watched: impl IntoIterator<Item = Behavior>, cooldown: Duration) -> Self {
        Self {
            watched: watched.into_iter().collect(),
            cooldown,
            last_alert: None,
        }
    }

    pub fn from_config(cfg: &AlertsConfig) -> Self {
        Self::new(
            cfg.watched_behaviors.iter().copied(),
            Duration::try_from_secs_f64(cfg.cooldown_seconds).unwrap_or_default(),
        )
    }

    pub fn last_alert(&self) -> Option<Instant> {
        self.last_alert
    }

    /// Fire at most one alert for this frame.
    ///
    /// Only the first pet detection with a watched behavior is considered;
    /// if the cooldown has not elapsed nothing fires for the whole frame.
    pub fn maybe_alert(
        &mut self,
        detections: &[EnrichedDetection],
        frame_index: u64,
        now: Instant,
    ) -> Option<AlertEvent> {
        let candidate = detections
            .iter()
            .find(|d| d.detection.is_pet() && self.watched.contains(&d.behavior))?;

        if let Some(last) = self.last_alert {
            if now.saturating_duration_since(last) <= self.cooldown {
                debug!(
                    "Alert for {} {} suppressed by cooldown",
                    candidate.detection.label, candidate.behavior
                );
                return None;
            }
        }
        self.last_alert = Some(now);

        let event = AlertEvent {
            pet_label: candidate.detection.label.clone(),
            behavior: candidate.behavior,
            bbox: candidate.detection.bbox,
            track: candidate.track.to_string(),
            frame_index,
            fired_at: Utc::now(),
        };
        info!("Alert: {} (track {})", event.message(), event.track);
        Some(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{Detection, NOT_PET_LABEL};

    fn enriched(label: &str, behavior: Behavior, track_id: i64) -> EnrichedDetection {
        let detection = Detection::new(BBox::new(0, 0, 10, 10), 0.9, label, Some(track_id));
        let track = detection.track_key(0);
        EnrichedDetection { detection, track, behavior, movement_distance: 0.0 }
    }

    fn policy(cooldown_secs: u64) -> AlertPolicy {
        AlertPolicy::new([Behavior::NearFood, Behavior::Sleeping], Duration::from_secs(cooldown_secs))
    }

    #[test]
    fn test_cooldown_window() {
        let mut policy = policy(10);
        let t0 = Instant::now();
        let frame = vec![enriched("dog", Behavior::Sleeping, 1)];

        let first = policy.maybe_alert(&frame, 0, t0).expect("first alert fires");
        assert_eq!(first.pet_label, "dog");
        assert_eq!(first.behavior, Behavior::Sleeping);

        assert!(policy.maybe_alert(&frame, 5, t0 + Duration::from_secs(5)).is_none());
        assert!(policy.maybe_alert(&frame, 11, t0 + Duration::from_secs(11)).is_some());
        assert_eq!(policy.last_alert(), Some(t0 + Duration::from_secs(11)));
    }

    #[test]
    fn test_cooldown_boundary_is_exclusive() {
        let mut policy = policy(10);
        let t0 = Instant::now();
        let frame = vec![enriched("cat", Behavior::NearFood, 1)];
        assert!(policy.maybe_alert(&frame, 0, t0).is_some());
        assert!(policy.maybe_alert(&frame, 1, t0 + Duration::from_secs(10)).is_none());
    }

    #[test]
    fn test_one_alert_per_frame_first_match_wins() {
        let mut policy = policy(0);
        let frame = vec![
            enriched("dog", Behavior::Running, 1),
            enriched("cat", Behavior::NearFood, 2),
            enriched("dog", Behavior::Sleeping, 3),
        ];
        let event = policy.maybe_alert(&frame, 7, Instant::now()).unwrap();
        assert_eq!(event.pet_label, "cat");
        assert_eq!(event.behavior, Behavior::NearFood);
        assert_eq!(event.track, "2");
        assert_eq!(event.frame_index, 7);
    }

    #[test]
    fn test_unwatched_or_not_pet_never_fire() {
        let mut policy = AlertPolicy::new([Behavior::Unknown, Behavior::Running], Duration::from_secs(0));
        let frame = vec![
            enriched(NOT_PET_LABEL, Behavior::Unknown, 1),
            enriched("dog", Behavior::Active, 2),
        ];
        assert!(policy.maybe_alert(&frame, 0, Instant::now()).is_none());
        assert!(policy.last_alert().is_none());
    }

    #[test]
    fn test_suppressed_frame_does_not_reset_window() {
        let mut policy = policy(10);
        let t0 = Instant::now();
        let frame = vec![enriched("dog", Behavior::Sleeping, 1)];
        policy.maybe_alert(&frame, 0, t0);
        policy.maybe_alert(&frame, 1, t0 + Duration::from_secs(9));
        assert_eq!(policy.last_alert(), Some(t0));
    }

    #[test]
    fn test_message_format() {
        let mut policy = policy(0);
        let frame = vec![enriched("cat", Behavior::NearFood, 4)];
        let event = policy.maybe_alert(&frame, 42, Instant::now()).unwrap();
        assert_eq!(event.message(), "cat near food at frame 42");
    }
}
