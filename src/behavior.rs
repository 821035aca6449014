//! Rule-based behavior classification from motion heuristics and ROI checks.
//!
//! Labels are heuristics: a pet that sits still for long enough is
//! "sleeping", whatever it is actually doing.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::BehaviorConfig;
use crate::detection::{distance, is_pet_label, BBox};
use crate::track_history::TrackEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Behavior {
    Sleeping,
    Active,
    Running,
    Exploring,
    NearFood,
    Unknown,
}

impl Behavior {
    pub fn as_str(&self) -> &'static str {
        match self {
            Behavior::Sleeping  => "sleeping",
            Behavior::Active    => "active",
            Behavior::Running   => "running",
            Behavior::Exploring => "exploring",
            Behavior::NearFood  => "near_food",
            Behavior::Unknown   => "unknown",
        }
    }
}

impl fmt::Display for Behavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Rules ───────────────────────────────────────────────────────────────────

/// Everything a rule may look at for one detection in one frame.
struct RuleInput<'a> {
    label: &'a str,
    bbox: BBox,
    roi: Option<BBox>,
    dist: f64,
    static_frames: u32,
    movement_threshold: f64,
    static_frame_threshold: u32,
}

type Rule = fn(&RuleInput<'_>) -> bool;

fn not_a_pet(r: &RuleInput<'_>) -> bool {
    !is_pet_label(r.label)
}

fn in_roi(r: &RuleInput<'_>) -> bool {
    r.roi.map_or(false, |roi| r.bbox.overlaps(&roi))
}

fn still_long_enough(r: &RuleInput<'_>) -> bool {
    r.static_frames >= r.static_frame_threshold
}

fn moved_fast(r: &RuleInput<'_>) -> bool {
    r.dist > r.movement_threshold * 3.0
}

fn moved(r: &RuleInput<'_>) -> bool {
    r.dist >= r.movement_threshold
}

/// Highest priority first; the first matching rule decides the label.
/// Nothing matching means `Active`.
const RULES: &[(Behavior, Rule)] = &[
    (Behavior::Unknown,   not_a_pet),
    (Behavior::NearFood,  in_roi),
    (Behavior::Sleeping,  still_long_enough),
    (Behavior::Running,   moved_fast),
    (Behavior::Exploring, moved),
];

/// Classify one detection against its track's history.
///
/// Updates the entry's static-frame run but leaves `last_centroid` and
/// `last_seen_frame` to the caller. Returns the label and the distance the
/// centroid moved since the previous observation.
pub fn classify(
    entry: &mut TrackEntry,
    bbox: BBox,
    label: &str,
    cfg: &BehaviorConfig,
) -> (Behavior, f64) {
    let dist = distance(entry.last_centroid, bbox.centroid());

    if dist < cfg.movement_threshold {
        entry.static_frame_count = entry.static_frame_count.saturating_add(1);
    } else {
        entry.static_frame_count = 0;
    }

    let input = RuleInput {
        label,
        bbox,
        roi: cfg.roi,
        dist,
        static_frames: entry.static_frame_count,
        movement_threshold: cfg.movement_threshold,
        static_frame_threshold: cfg.static_frame_threshold,
    };

    let behavior = RULES
        .iter()
        .find(|(_, rule)| rule(&input))
        .map(|(behavior, _)| *behavior)
        .unwrap_or(Behavior::Active);

    (behavior, dist)
}
