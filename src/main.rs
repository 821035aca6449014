use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::watch;

use petwatch::config::{self, AppConfig};
use petwatch::detection::BBox;
use petwatch::logging;
use petwatch::pipeline::Pipeline;

#[derive(Parser)]
#[command(name = "petwatch", version)]
#[command(about = "Pet behavior monitoring — motion heuristics, ROI zones and cooldown-gated alerts")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the monitor over recorded detector output (JSON lines)
    Run {
        /// Detections file, or `-` for stdin
        #[arg(long)] source:    Option<String>,
        #[arg(long)] camera_id: Option<String>,
        /// Food bowl zone as X1,Y1,X2,Y2
        #[arg(long, value_parser = parse_roi)] roi: Option<BBox>,
        /// Seconds between two alerts
        #[arg(long)] cooldown:  Option<f64>,
        /// Print enriched detections per frame as JSON lines
        #[arg(long)] json:      bool,
    },

    /// Print the effective configuration
    Config,
}

fn parse_roi(s: &str) -> Result<BBox, String> {
    let parts = s
        .split(',')
        .map(|p| p.trim().parse::<i32>().map_err(|e| format!("invalid coordinate {:?}: {}", p, e)))
        .collect::<Result<Vec<_>, _>>()?;
    match parts.as_slice() {
        [x1, y1, x2, y2] => Ok(BBox::new(*x1, *y1, *x2, *y2)),
        _ => Err(format!("expected 4 comma-separated values, got {}", parts.len())),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = config::load_config();
    let mut cfg = match &loaded {
        Ok(cfg) => cfg.clone(),
        Err(_) => AppConfig::default(),
    };
    let log_dir = logging::init_logging(&cfg.logging);
    if let Err(e) = loaded {
        tracing::warn!("Config load failed ({}), using defaults", e);
    }
    if let Some(dir) = &log_dir {
        tracing::info!("Writing logs under {}", dir.display());
    }

    match cli.command {
        Command::Run { source, camera_id, roi, cooldown, json } => {
            if let Some(s)  = source    { cfg.source.path = s; }
            if let Some(id) = camera_id { cfg.source.camera_id = id; }
            if let Some(r)  = roi       { cfg.behavior.roi = Some(r); }
            if let Some(c)  = cooldown  { cfg.alerts.cooldown_seconds = c; }
            cfg.validate().context("invalid configuration")?;

            print_startup_info(&cfg);

            let (stop_tx, stop_rx) = watch::channel(false);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    let _ = stop_tx.send(true);
                }
            });

            let summary = Pipeline::new(cfg)
                .with_json_output(json)
                .run(stop_rx)
                .await
                .context("monitoring pipeline failed")?;

            eprintln!(
                "Processed {} frames ({} detections), fired {} alerts",
                summary.frames,
                summary.detections,
                summary.alerts.len()
            );
            for (behavior, count) in &summary.behavior_counts {
                eprintln!("  {:<10} {}", behavior.as_str(), count);
            }
        }

        Command::Config => {
            println!("{}", serde_json::to_string_pretty(&cfg)?);
        }
    }
    Ok(())
}

fn print_startup_info(cfg: &AppConfig) {
    let roi = cfg.behavior.roi
        .map(|r| r.to_string())
        .unwrap_or_else(|| "none".into());
    let watched = cfg.alerts.watched_behaviors
        .iter()
        .map(|b| b.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let webhook = cfg.alerts.webhook_url.as_deref()
        .filter(|u| !u.is_empty())
        .unwrap_or("none");

    eprintln!("╔══════════════════════════════════════════════════════════╗");
    eprintln!("║            PETWATCH v{:<36}║", env!("CARGO_PKG_VERSION"));
    eprintln!("╠══════════════════════════════════════════════════════════╣");
    eprintln!("  Camera:    {} → {}", cfg.source.camera_id, cfg.source.path);
    eprintln!("  Motion:    {}px, sleeping after {} still frames",
        cfg.behavior.movement_threshold, cfg.behavior.static_frame_threshold);
    eprintln!("  History:   {} frames TTL", cfg.behavior.ttl_frames);
    eprintln!("  ROI:       {}", roi);
    eprintln!("  Alerts:    [{}] cooldown {}s", watched, cfg.alerts.cooldown_seconds);
    eprintln!("  Webhook:   {}", webhook);
    eprintln!("╚══════════════════════════════════════════════════════════╝");
}
