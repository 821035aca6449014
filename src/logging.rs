use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing::warn;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Where file logs went, decided by the first `init_logging` call.
static FILE_SINK: OnceLock<Option<PathBuf>> = OnceLock::new();
static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

pub fn resolve_log_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("petwatch")
        .join("logs")
}

fn open_file_appender(log_dir: &Path) -> io::Result<RollingFileAppender> {
    std::fs::create_dir_all(log_dir)?;
    Ok(RollingFileAppender::new(Rotation::DAILY, log_dir, "petwatch.log"))
}

/// Filter precedence: `RUST_LOG`, then `PETWATCH_LOG_LEVEL`, then the config.
fn build_filter(cfg: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| {
            EnvFilter::try_new(std::env::var("PETWATCH_LOG_LEVEL").unwrap_or_else(|_| cfg.level.clone()))
        })
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global `tracing` subscriber. Safe to call more than once;
/// only the first call has any effect.
///
/// Events always go to stderr (stdout carries `run --json` output). With
/// `logging.file` set they are also written to a daily-rotated file, and the
/// directory holding it is returned.
pub fn init_logging(cfg: &LoggingConfig) -> Option<PathBuf> {
    FILE_SINK
        .get_or_init(|| {
            let mut file_error = None;
            let file_layer = if cfg.file {
                let dir = resolve_log_dir();
                match open_file_appender(&dir) {
                    Ok(appender) => {
                        let (writer, guard) = tracing_appender::non_blocking(appender);
                        LOG_GUARD.set(guard).ok();
                        let layer = fmt::layer()
                            .with_ansi(false)
                            .with_timer(UtcTime::rfc_3339())
                            .with_writer(writer);
                        Some((layer, dir))
                    }
                    Err(e) => {
                        file_error = Some((dir, e));
                        None
                    }
                }
            } else {
                None
            };

            let stderr_layer = fmt::layer()
                .with_timer(UtcTime::rfc_3339())
                .with_writer(io::stderr);

            let (file_layer, dir) = match file_layer {
                Some((layer, dir)) => (Some(layer), Some(dir)),
                None => (None, None),
            };
            tracing_subscriber::registry()
                .with(build_filter(cfg))
                .with(stderr_layer)
                .with(file_layer)
                .init();

            if let Some((dir, e)) = file_error {
                warn!("File logging disabled, cannot use {}: {}", dir.display(), e);
            }
            dir
        })
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_dir_is_namespaced() {
        assert!(resolve_log_dir().ends_with("petwatch/logs"));
    }

    #[test]
    fn test_open_file_appender_creates_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("nested").join("logs");
        open_file_appender(&dir).unwrap();
        assert!(dir.is_dir());
    }
}
