//! Monitoring Pipeline — frame loop orchestration
//!
//! Architecture:
//!   recorded detector output (blocking reader thread)
//!     → [flume channel] → behavior engine (per-track state, TTL eviction)
//!       → alert policy (cooldown gate, ≤1 alert per frame)
//!         → [flume channel] → alert dispatcher (console / webhook)
//!
//! The engine and policy live on the pipeline task alone, so frames are
//! processed strictly one after another.

use std::collections::BTreeMap;
use std::io::BufRead;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::alert_policy::{AlertEvent, AlertPolicy};
use crate::alerts::{sinks_from_config, AlertDispatcher, AlertSink, DeliveryStats};
use crate::behavior::Behavior;
use crate::config::AppConfig;
use crate::engine::{BehaviorEngine, EnrichedDetection};
use crate::error::{PetwatchError, Result};
use crate::source::{self, Frame, FrameReader};

/// What happened during one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub camera_id: String,
    pub frames: u64,
    pub detections: u64,
    pub skipped_records: u64,
    pub behavior_counts: BTreeMap<Behavior, u64>,
    pub alerts: Vec<AlertEvent>,
    pub dropped_alerts: u64,
    pub delivered: u64,
    pub failed_deliveries: u64,
}

/// One JSON line of `--json` output.
#[derive(Serialize)]
struct FrameOutput<'a> {
    camera_id: &'a str,
    frame: u64,
    detections: &'a [EnrichedDetection],
    #[serde(skip_serializing_if = "Option::is_none")]
    alert: Option<&'a AlertEvent>,
}

pub struct Pipeline {
    cfg: AppConfig,
    sinks: Option<Vec<AlertSink>>,
    json_output: bool,
}

impl Pipeline {
    pub fn new(cfg: AppConfig) -> Self {
        Self { cfg, sinks: None, json_output: false }
    }

    /// Print every frame's enriched detections to stdout as JSON lines.
    pub fn with_json_output(mut self, enabled: bool) -> Self {
        self.json_output = enabled;
        self
    }

    /// Use these transports instead of the configured ones.
    pub fn with_sinks(mut self, sinks: Vec<AlertSink>) -> Self {
        self.sinks = Some(sinks);
        self
    }

    /// Run against the configured source until it ends or `stop` flips to true.
    pub async fn run(self, stop: watch::Receiver<bool>) -> Result<RunSummary> {
        let reader = source::open(&self.cfg.source.path)?;
        info!("Reading detections from {}", display_source(&self.cfg.source.path));
        self.run_reader(reader, stop).await
    }

    pub async fn run_reader<R>(self, reader: R, mut stop: watch::Receiver<bool>) -> Result<RunSummary>
    where
        R: BufRead + Send + 'static,
    {
        let Pipeline { cfg, sinks, json_output } = self;
        cfg.validate()?;

        let mut engine = BehaviorEngine::new(cfg.behavior.clone());
        let mut policy = AlertPolicy::from_config(&cfg.alerts);

        let sinks = sinks.unwrap_or_else(|| sinks_from_config(&cfg.alerts));
        let (dispatcher, dispatch_handle) = AlertDispatcher::spawn(sinks, cfg.alerts.queue_capacity);

        // Channel: reader thread → frame loop (bounded; replay waits instead of dropping)
        let (frame_tx, frame_rx) = flume::bounded::<Result<Frame>>(cfg.source.channel_capacity);
        spawn_reader(reader, frame_tx, cfg.detector.pet_confidence, cfg.source.frame_interval())?;

        let mut summary = RunSummary { camera_id: cfg.source.camera_id.clone(), ..RunSummary::default() };
        let started = Instant::now();
        let mut stop_open = true;

        info!("Pipeline running. Camera: {}", cfg.source.camera_id);

        loop {
            if *stop.borrow() {
                info!("Pipeline stop signal received for {}", cfg.source.camera_id);
                break;
            }

            let item = tokio::select! {
                changed = stop.changed(), if stop_open => {
                    if changed.is_err() {
                        stop_open = false;
                    }
                    continue;
                }
                item = frame_rx.recv_async() => match item {
                    Ok(item) => item,
                    Err(_) => break, // source exhausted
                },
            };

            let frame = match item {
                Ok(frame) => frame,
                Err(e @ PetwatchError::Source { .. }) => {
                    warn!("Skipping record: {}", e);
                    summary.skipped_records += 1;
                    continue;
                }
                Err(e) => {
                    warn!("Source read failed, stopping: {}", e);
                    break;
                }
            };

            let now = frame_clock(started, frame.ts);
            let enriched = engine.update(&frame.detections, frame.index);

            summary.frames += 1;
            summary.detections += enriched.len() as u64;
            for det in &enriched {
                *summary.behavior_counts.entry(det.behavior).or_default() += 1;
            }

            let alert = policy.maybe_alert(&enriched, frame.index, now);

            if json_output {
                let line = FrameOutput {
                    camera_id: &cfg.source.camera_id,
                    frame: frame.index,
                    detections: &enriched,
                    alert: alert.as_ref(),
                };
                match serde_json::to_string(&line) {
                    Ok(json) => println!("{}", json),
                    Err(e) => warn!("Frame {} not serialized: {}", frame.index, e),
                }
            }

            if let Some(event) = alert {
                if !dispatcher.dispatch(event.clone()) {
                    summary.dropped_alerts += 1;
                }
                summary.alerts.push(event);
            }
        }

        // Closing the channels lets the reader thread and dispatcher wind down.
        drop(frame_rx);
        drop(dispatcher);
        let stats = match dispatch_handle.await {
            Ok(stats) => stats,
            Err(e) => {
                warn!("Alert dispatcher task failed: {}", e);
                DeliveryStats::default()
            }
        };
        summary.delivered = stats.delivered;
        summary.failed_deliveries = stats.failed;

        info!(
            "Pipeline finished for {}: {} frames, {} detections, {} alerts ({} skipped records)",
            summary.camera_id,
            summary.frames,
            summary.detections,
            summary.alerts.len(),
            summary.skipped_records
        );
        Ok(summary)
    }
}

/// Instant used for cooldown decisions: the recorded timestamp when there is
/// one, wall clock otherwise.
fn frame_clock(started: Instant, ts: Option<f64>) -> Instant {
    ts.and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .and_then(|offset| started.checked_add(offset))
        .unwrap_or_else(Instant::now)
}

fn display_source(path: &str) -> &str {
    if path == "-" { "stdin" } else { path }
}

fn spawn_reader<R>(
    reader: R,
    tx: flume::Sender<Result<Frame>>,
    pet_confidence: f32,
    pace: Option<Duration>,
) -> Result<()>
where
    R: BufRead + Send + 'static,
{
    std::thread::Builder::new()
        .name("petwatch-source".into())
        .spawn(move || {
            for item in FrameReader::new(reader, pet_confidence) {
                let is_frame = item.is_ok();
                if tx.send(item).is_err() {
                    break; // pipeline stopped
                }
                if let (true, Some(pace)) = (is_frame, pace) {
                    std::thread::sleep(pace);
                }
            }
        })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_clock_uses_recorded_ts() {
        let started = Instant::now();
        assert_eq!(frame_clock(started, Some(2.5)), started + Duration::from_millis(2500));
        assert!(frame_clock(started, Some(-1.0)) >= started);
        assert!(frame_clock(started, None) >= started);
    }

    #[test]
    fn test_display_source() {
        assert_eq!(display_source("-"), "stdin");
        assert_eq!(display_source("frames.jsonl"), "frames.jsonl");
    }
}
