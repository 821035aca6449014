//! Pet behavior monitoring.
//!
//! Turns per-frame pet detections (bounding boxes plus tracker ids) into
//! temporally smoothed behavior labels, and decides when a labeled event is
//! worth an alert.

pub mod alert_policy;
pub mod alerts;
pub mod behavior;
pub mod config;
pub mod detection;
pub mod engine;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod source;
pub mod track_history;

pub use alert_policy::{AlertEvent, AlertPolicy};
pub use behavior::Behavior;
pub use config::AppConfig;
pub use detection::{BBox, Detection, TrackKey, NOT_PET_LABEL};
pub use engine::{BehaviorEngine, EnrichedDetection};
pub use error::PetwatchError;
