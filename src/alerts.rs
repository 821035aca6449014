//! Alert transports and the background dispatcher feeding them.
//!
//! The frame loop only ever calls [`AlertDispatcher::dispatch`], which never
//! blocks: when the queue is full the event is dropped with a warning.
//! Delivery failures are logged here and go no further.

use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::alert_policy::AlertEvent;
use crate::behavior::Behavior;
use crate::config::AlertsConfig;
use crate::detection::BBox;

// ─── Transports ──────────────────────────────────────────────────────────────

/// JSON body POSTed to the webhook.
#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    pet_label: &'a str,
    behavior:  Behavior,
    bbox:      BBox,
}

pub struct WebhookSink {
    client: reqwest::Client,
    url:    String,
}

impl WebhookSink {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url: url.to_string() })
    }

    async fn send(&self, event: &AlertEvent) -> Result<(), reqwest::Error> {
        let payload = WebhookPayload {
            pet_label: &event.pet_label,
            behavior:  event.behavior,
            bbox:      event.bbox,
        };
        self.client
            .post(&self.url)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

pub enum AlertSink {
    /// `[ALERT] <timestamp> - <message>` on stdout.
    Console,
    Webhook(WebhookSink),
}

impl AlertSink {
    pub fn name(&self) -> &'static str {
        match self {
            AlertSink::Console    => "console",
            AlertSink::Webhook(_) => "webhook",
        }
    }

    async fn deliver(&self, event: &AlertEvent) -> Result<(), reqwest::Error> {
        match self {
            AlertSink::Console => {
                println!("{}", console_line(event));
                Ok(())
            }
            AlertSink::Webhook(sink) => sink.send(event).await,
        }
    }
}

pub fn console_line(event: &AlertEvent) -> String {
    format!("[ALERT] {} - {}", event.fired_at.format("%Y-%m-%d %H:%M:%S"), event.message())
}

/// Build the configured transports. A webhook that cannot be set up is
/// skipped with a warning rather than stopping the monitor.
pub fn sinks_from_config(cfg: &AlertsConfig) -> Vec<AlertSink> {
    let mut sinks = Vec::new();
    if cfg.console {
        sinks.push(AlertSink::Console);
    }
    if let Some(url) = cfg.webhook_url.as_deref().filter(|u| !u.is_empty()) {
        match WebhookSink::new(url, Duration::from_secs(cfg.webhook_timeout_secs)) {
            Ok(sink) => sinks.push(AlertSink::Webhook(sink)),
            Err(e) => warn!("Webhook transport disabled ({}): {}", url, e),
        }
    }
    sinks
}

// ─── Dispatcher ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryStats {
    pub delivered: u64,
    pub failed:    u64,
}

pub struct AlertDispatcher {
    tx: flume::Sender<AlertEvent>,
}

impl AlertDispatcher {
    /// Start the delivery task. It runs until every dispatcher clone is
    /// dropped and the queue is drained.
    pub fn spawn(sinks: Vec<AlertSink>, capacity: usize) -> (Self, JoinHandle<DeliveryStats>) {
        let (tx, rx) = flume::bounded::<AlertEvent>(capacity);

        let handle = tokio::spawn(async move {
            let mut stats = DeliveryStats::default();
            while let Ok(event) = rx.recv_async().await {
                for sink in &sinks {
                    match sink.deliver(&event).await {
                        Ok(()) => {
                            stats.delivered += 1;
                            debug!("Alert delivered via {}", sink.name());
                        }
                        Err(e) => {
                            stats.failed += 1;
                            warn!("Alert delivery via {} failed: {}", sink.name(), e);
                        }
                    }
                }
            }
            info!("Alert dispatcher stopped ({} delivered, {} failed)", stats.delivered, stats.failed);
            stats
        });

        (Self { tx }, handle)
    }

    /// Queue an event for delivery. Returns false if it had to be dropped.
    pub fn dispatch(&self, event: AlertEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(flume::TrySendError::Full(event)) => {
                warn!("Alert queue full, dropping: {}", event.message());
                false
            }
            Err(flume::TrySendError::Disconnected(event)) => {
                warn!("Alert dispatcher gone, dropping: {}", event.message());
                false
            }
        }
    }
}
