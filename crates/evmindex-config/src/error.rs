//! Errors raised while loading configuration or installing the logger.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse yaml: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("no chains configured")]
    NoChains,

    #[error("install tracing subscriber: {0}")]
    Logging(#[from] tracing_subscriber::util::TryInitError),
}
