//! Pet Monitor Configuration
//!
//! Loaded from petwatch.toml (working directory) with env-var overrides.
//! Env format: PETWATCH__SECTION__KEY (double underscore separators).

use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::behavior::Behavior;
use crate::detection::BBox;
use crate::error::{PetwatchError, Result};

pub const ENV_PREFIX: &str = "PETWATCH";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub behavior: BehaviorConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        self.behavior.validate()?;
        if self.source.channel_capacity == 0 {
            return Err(PetwatchError::InvalidConfig("source.channel_capacity must be > 0".into()));
        }
        if self.alerts.queue_capacity == 0 {
            return Err(PetwatchError::InvalidConfig("alerts.queue_capacity must be > 0".into()));
        }
        if !self.alerts.cooldown_seconds.is_finite() || self.alerts.cooldown_seconds < 0.0 {
            return Err(PetwatchError::InvalidConfig(format!(
                "alerts.cooldown_seconds must be a non-negative number, got {}",
                self.alerts.cooldown_seconds
            )));
        }
        if let Some(fps) = self.source.fps {
            if self.source.frame_interval().is_none() {
                return Err(PetwatchError::InvalidConfig(format!(
                    "source.fps must be a positive rate with a representable frame interval, got {}",
                    fps
                )));
            }
        }
        Ok(())
    }
}

// ─── Source ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Recorded detector output (JSON lines); `-` reads stdin.
    #[serde(default = "default_source_path")]
    pub path: String,
    #[serde(default = "default_camera_id")]
    pub camera_id: String,
    /// Replay pace. Unset means as fast as the records can be read.
    pub fps: Option<f64>,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_source_path() -> String {
    "-".to_string()
}
fn default_camera_id() -> String {
    "cam0".to_string()
}
fn default_channel_capacity() -> usize {
    16
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            path: default_source_path(),
            camera_id: default_camera_id(),
            fps: None,
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl SourceConfig {
    /// Pause between replayed frames; `None` when unpaced or when `fps`
    /// does not give a usable interval.
    pub fn frame_interval(&self) -> Option<Duration> {
        let fps = self.fps.filter(|fps| fps.is_finite() && *fps > 0.0)?;
        Duration::try_from_secs_f64(1.0 / fps).ok()
    }
}

// ─── Detector ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Raw class-id detections at or below this confidence are not pets.
    #[serde(default = "default_pet_confidence")]
    pub pet_confidence: f32,
}

fn default_pet_confidence() -> f32 {
    0.5
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self { pet_confidence: default_pet_confidence() }
    }
}

// ─── Behavior ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehaviorConfig {
    /// Consecutive near-still frames before a pet counts as sleeping.
    #[serde(default = "default_static_frame_threshold")]
    pub static_frame_threshold: u32,
    /// Centroid shift (pixels) that counts as movement.
    #[serde(default = "default_movement_threshold")]
    pub movement_threshold: f64,
    /// Food bowl (or any other zone) as `[x1, y1, x2, y2]`.
    #[serde(default)]
    pub roi: Option<BBox>,
    #[serde(default = "default_ttl_frames")]
    pub ttl_frames: u64,
}

fn default_static_frame_threshold() -> u32 {
    30
}
fn default_movement_threshold() -> f64 {
    15.0
}
fn default_ttl_frames() -> u64 {
    100
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            static_frame_threshold: default_static_frame_threshold(),
            movement_threshold: default_movement_threshold(),
            roi: None,
            ttl_frames: default_ttl_frames(),
        }
    }
}

impl BehaviorConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.movement_threshold.is_finite() || self.movement_threshold < 0.0 {
            return Err(PetwatchError::InvalidConfig(format!(
                "behavior.movement_threshold must be a non-negative number, got {}",
                self.movement_threshold
            )));
        }
        if self.static_frame_threshold == 0 {
            return Err(PetwatchError::InvalidConfig("behavior.static_frame_threshold must be > 0".into()));
        }
        Ok(())
    }
}

// ─── Alerts ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsConfig {
    #[serde(default = "default_watched_behaviors")]
    pub watched_behaviors: BTreeSet<Behavior>,
    /// Minimum time between two alerts, across all tracks.
    #[serde(default = "default_cooldown_seconds")]
    pub cooldown_seconds: f64,
    /// Print alerts to stdout.
    #[serde(default = "default_console")]
    pub console: bool,
    /// POST alerts as JSON to this URL.
    pub webhook_url: Option<String>,
    #[serde(default = "default_webhook_timeout_secs")]
    pub webhook_timeout_secs: u64,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_watched_behaviors() -> BTreeSet<Behavior> {
    [Behavior::NearFood, Behavior::Sleeping].into_iter().collect()
}
fn default_cooldown_seconds() -> f64 {
    5.0
}
fn default_console() -> bool {
    true
}
fn default_webhook_timeout_secs() -> u64 {
    5
}
fn default_queue_capacity() -> usize {
    8
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            watched_behaviors: default_watched_behaviors(),
            cooldown_seconds: default_cooldown_seconds(),
            console: default_console(),
            webhook_url: None,
            webhook_timeout_secs: default_webhook_timeout_secs(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

// ─── Logging ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Also write daily-rotated log files under the user data dir.
    #[serde(default)]
    pub file: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), file: false }
    }
}

// ─── Loading ─────────────────────────────────────────────────────────────────

/// Load configuration from petwatch.toml + environment variable overrides.
///
/// Search order:
///   1. ./petwatch.toml (working directory, optional)
///   2. Environment variables: PETWATCH__BEHAVIOR__TTL_FRAMES, etc.
pub fn load_config() -> Result<AppConfig> {
    build_config(None, ENV_PREFIX)
}

/// Same as [`load_config`] with an explicit file and env prefix.
pub fn build_config(file: Option<&Path>, env_prefix: &str) -> Result<AppConfig> {
    let file_source = match file {
        Some(path) => config::File::from(path).required(true),
        None => config::File::with_name("petwatch").required(false),
    };

    let settings = config::Config::builder()
        .add_source(file_source)
        .add_source(
            config::Environment::with_prefix(env_prefix)
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("alerts.watched_behaviors"),
        )
        .build()?;

    let app: AppConfig = settings.try_deserialize()?;
    app.validate()?;
    Ok(app)
}
