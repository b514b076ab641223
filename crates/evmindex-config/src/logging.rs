//! Tracing / logging initialisation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::ConfigError;

/// Log levels and output format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Global default level: "trace" | "debug" | "info" | "warn" | "error"
    #[serde(default = "default_level")]
    pub level: String,
    /// Override per component: crate name → level
    #[serde(default)]
    pub components: BTreeMap<String, String>,
    /// Emit JSON structured logs (true) or human-readable text (false)
    #[serde(default)]
    pub json: bool,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            components: BTreeMap::new(),
            json: false,
        }
    }
}

impl LogConfig {
    /// Filter directives, e.g. `"info,evmindex_core=debug"`.
    pub fn directives(&self) -> String {
        let mut directives = self.level.clone();
        for (component, level) in &self.components {
            directives.push_str(&format!(",{}={}", component.replace('-', "_"), level));
        }
        directives
    }
}

/// Install the global subscriber. Logs go to stderr.
///
/// `RUST_LOG`, when set and valid, replaces the configured directives.
/// Fails if a global subscriber is already installed.
pub fn init_tracing(config: &LogConfig) -> Result<(), ConfigError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.directives()))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if config.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_plain_info() {
        let config = LogConfig::default();
        assert_eq!(config.directives(), "info");
        assert!(!config.json);
    }

    #[test]
    fn component_directives_are_ordered_and_normalised() {
        let mut config = LogConfig {
            level: "warn".into(),
            ..Default::default()
        };
        config.components.insert("evmindex-core".into(), "debug".into());
        config.components.insert("evmindex_cli".into(), "trace".into());
        assert_eq!(
            config.directives(),
            "warn,evmindex_cli=trace,evmindex_core=debug"
        );
    }

    #[test]
    fn second_init_fails_instead_of_panicking() {
        let config = LogConfig::default();
        assert!(init_tracing(&config).is_ok());
        let second = init_tracing(&config);
        assert!(matches!(second, Err(ConfigError::Logging(_))));
    }
}
