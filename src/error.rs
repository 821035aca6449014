use thiserror::Error;

/// Errors surfaced by the plumbing around the behavior engine.
///
/// The engine and alert policy themselves never fail; everything here comes
/// from configuration or from reading recorded detector output.
#[derive(Debug, Error)]
pub enum PetwatchError {
    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed detection record on line {line}: {source}")]
    Source {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, PetwatchError>;
