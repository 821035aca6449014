//! Detection records exchanged between the detector/tracker and the engine.
//!
//! Bounding boxes are pixel coordinates `(x1, y1, x2, y2)`. Nothing here
//! enforces `x1 <= x2` or `y1 <= y2`; the geometry helpers degrade to
//! "no overlap" for malformed boxes instead of failing.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Label the detector assigns to anything that is not a recognized pet.
pub const NOT_PET_LABEL: &str = "Not Pet";

// ─── Geometry ────────────────────────────────────────────────────────────────

/// Axis-aligned box in pixel coordinates. Serialized as `[x1, y1, x2, y2]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[i32; 4]", into = "[i32; 4]")]
pub struct BBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BBox {
    pub const fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Integer centre of the box, rounding towards negative infinity.
    pub fn centroid(&self) -> (i32, i32) {
        (
            midpoint(self.x1, self.x2),
            midpoint(self.y1, self.y2),
        )
    }

    /// True when the intersection has strictly positive width and height.
    pub fn overlaps(&self, other: &BBox) -> bool {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);
        ix2 > ix1 && iy2 > iy1
    }
}

impl From<[i32; 4]> for BBox {
    fn from(v: [i32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<BBox> for [i32; 4] {
    fn from(b: BBox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

impl fmt::Display for BBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {}, {}]", self.x1, self.y1, self.x2, self.y2)
    }
}

/// Euclidean distance between two pixel points.
/// Floor of the midpoint, computed wide so extreme coordinates cannot overflow.
fn midpoint(a: i32, b: i32) -> i32 {
    (i64::from(a) + i64::from(b)).div_euclid(2) as i32
}

pub fn distance(a: (i32, i32), b: (i32, i32)) -> f64 {
    let dx = (a.0 as f64 - b.0 as f64).abs();
    let dy = (a.1 as f64 - b.1 as f64).abs();
    dx.hypot(dy)
}

// ─── Pet classes ─────────────────────────────────────────────────────────────

/// The animals we monitor.
/// Every other COCO class is reported as [`NOT_PET_LABEL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PetClass {
    Cat,
    Dog,
    Horse,
    Sheep,
    Cow,
}

impl PetClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            PetClass::Cat   => "cat",
            PetClass::Dog   => "dog",
            PetClass::Horse => "horse",
            PetClass::Sheep => "sheep",
            PetClass::Cow   => "cow",
        }
    }

    /// Map COCO class id (YOLOv8) → pet class
    pub fn from_coco_id(id: u32) -> Option<Self> {
        match id {
            15 => Some(PetClass::Cat),
            16 => Some(PetClass::Dog),
            17 => Some(PetClass::Horse),
            18 => Some(PetClass::Sheep),
            19 => Some(PetClass::Cow),
            _  => None,
        }
    }

    /// Label for a raw detector hit. Low-confidence pets are not trusted.
    pub fn label_for(class_id: u32, confidence: f32, min_confidence: f32) -> String {
        match Self::from_coco_id(class_id) {
            Some(class) if confidence > min_confidence => class.as_str().to_string(),
            _ => NOT_PET_LABEL.to_string(),
        }
    }
}

/// Whether `label` names a pet rather than the detector's not-a-pet sentinel.
pub fn is_pet_label(label: &str) -> bool {
    label != NOT_PET_LABEL
}

// ─── Detections ──────────────────────────────────────────────────────────────

/// One object reported by the detector/tracker for a single frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: BBox,
    pub confidence: f32,
    pub label: String,
    /// Stable identity from the tracker, if it supplied one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_id: Option<i64>,
}

impl Detection {
    pub fn new(bbox: BBox, confidence: f32, label: impl Into<String>, track_id: Option<i64>) -> Self {
        Self { bbox, confidence, label: label.into(), track_id }
    }

    pub fn is_pet(&self) -> bool {
        is_pet_label(&self.label)
    }

    /// Key under which this detection's history is kept.
    ///
    /// `ordinal` is the detection's position within the current frame and is
    /// only used when the tracker gave no id.
    pub fn track_key(&self, ordinal: usize) -> TrackKey {
        match self.track_id {
            Some(id) => TrackKey::Tracked(id),
            None => TrackKey::Unidentified { label: self.label.clone(), ordinal },
        }
    }
}

/// Detector output as recorded on disk: either already labeled, or carrying
/// the raw COCO class id.
#[derive(Debug, Clone, Deserialize)]
pub struct RawDetection {
    pub bbox: BBox,
    #[serde(default = "default_confidence")]
    pub confidence: f32,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub class_id: Option<u32>,
    #[serde(default)]
    pub track_id: Option<i64>,
}

fn default_confidence() -> f32 {
    1.0
}

impl RawDetection {
    pub fn into_detection(self, pet_confidence: f32) -> Detection {
        let label = match (self.label, self.class_id) {
            (Some(label), _) => label,
            (None, Some(id)) => PetClass::label_for(id, self.confidence, pet_confidence),
            (None, None) => NOT_PET_LABEL.to_string(),
        };
        Detection {
            bbox: self.bbox,
            confidence: self.confidence,
            label,
            track_id: self.track_id,
        }
    }
}

// ─── Track keys ──────────────────────────────────────────────────────────────

/// Identity used to look up a track's history.
///
/// `Unidentified` keys are synthesized per frame from label and position in
/// the detection list. They are unique within one frame but carry no real
/// identity across frames, so history kept under them is only as good as
/// the detector's output order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TrackKey {
    Tracked(i64),
    Unidentified { label: String, ordinal: usize },
}

impl fmt::Display for TrackKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackKey::Tracked(id) => write!(f, "{}", id),
            TrackKey::Unidentified { label, ordinal } => write!(f, "{}_{}", label, ordinal),
        }
    }
}

impl Serialize for TrackKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
