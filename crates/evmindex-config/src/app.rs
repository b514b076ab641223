//! Chain configuration loaded from YAML.

use std::path::Path;

use serde::{Deserialize, Serialize};

use evmindex_core::{PlannerBuilder, DEFAULT_SAFETY_WINDOW};

use crate::error::ConfigError;
use crate::logging::LogConfig;

/// One blockchain to ingest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Chain slug, e.g. `"ethereum"`.
    pub name: String,
    pub chain_id: u64,
    /// HTTP JSON-RPC endpoint.
    #[serde(default)]
    pub rpc_http: String,
    /// WebSocket JSON-RPC endpoint.
    #[serde(default)]
    pub rpc_ws: String,
    /// First block to backfill from.
    #[serde(default)]
    pub start_block: u64,
    /// Block numbers per planner batch. 0 = planner default.
    #[serde(default)]
    pub batch_size: u64,
    /// How receipts are fetched downstream (e.g. `"block"` or `"tx"`).
    #[serde(default)]
    pub receipts_mode: String,
    /// Confirmations required before a block is planned.
    #[serde(default = "default_safety_window")]
    pub safety_window: u64,
    /// Capacity of the queue between planner and fetchers.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_safety_window() -> u64 {
    DEFAULT_SAFETY_WINDOW
}

fn default_channel_capacity() -> usize {
    1_000
}

impl ChainConfig {
    /// Queue capacity, never zero (a bounded channel needs at least one slot).
    pub fn queue_capacity(&self) -> usize {
        self.channel_capacity.max(1)
    }

    /// A planner builder carrying this chain's batch size and safety window.
    /// The caller supplies the head source.
    pub fn planner_builder(&self) -> PlannerBuilder {
        PlannerBuilder::new()
            .batch_size(self.batch_size)
            .safety_window(self.safety_window)
    }
}

/// Root of the YAML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub chains: Vec<ChainConfig>,
    #[serde(default)]
    pub logging: LogConfig,
}

impl AppConfig {
    /// Read and validate a YAML config file.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&raw)
    }

    /// Parse and validate YAML text.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let cfg: AppConfig = serde_yaml::from_str(yaml)?;
        if cfg.chains.is_empty() {
            return Err(ConfigError::NoChains);
        }
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_CHAINS: &str = r#"
chains:
  - name: ethereum
    chain_id: 1
    rpc_http: https://eth.example/rpc
    rpc_ws: wss://eth.example/ws
    start_block: 19000000
    batch_size: 100
    receipts_mode: block
  - name: base
    chain_id: 8453
    rpc_http: https://base.example/rpc
    start_block: 12000000
    batch_size: 0
    safety_window: 64
    channel_capacity: 0
logging:
  level: debug
  json: true
"#;

    #[test]
    fn parses_chains_with_defaults() {
        let cfg = AppConfig::from_yaml_str(TWO_CHAINS).unwrap();
        assert_eq!(cfg.chains.len(), 2);

        let eth = &cfg.chains[0];
        assert_eq!(eth.name, "ethereum");
        assert_eq!(eth.chain_id, 1);
        assert_eq!(eth.rpc_ws, "wss://eth.example/ws");
        assert_eq!(eth.start_block, 19_000_000);
        assert_eq!(eth.receipts_mode, "block");
        assert_eq!(eth.safety_window, 6);
        assert_eq!(eth.queue_capacity(), 1_000);

        let base = &cfg.chains[1];
        assert_eq!(base.rpc_ws, "");
        assert_eq!(base.safety_window, 64);
        assert_eq!(base.queue_capacity(), 1);

        assert_eq!(cfg.logging.level, "debug");
        assert!(cfg.logging.json);
    }

    #[test]
    fn planner_builder_carries_chain_settings() {
        let cfg = AppConfig::from_yaml_str(TWO_CHAINS).unwrap();
        let planner = cfg.chains[1].planner_builder().build();
        assert_eq!(planner.batch_size, 0);
        assert_eq!(planner.effective_batch_size(), 100);
        assert_eq!(planner.safety_window, 64);
        assert!(planner.heads.is_none());
    }

    #[test]
    fn empty_chain_list_is_rejected() {
        let err = AppConfig::from_yaml_str("chains: []\n").unwrap_err();
        assert!(matches!(err, ConfigError::NoChains));
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        let err = AppConfig::from_yaml_str("chains: [ {name: x, chain_id: -1} ]").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().starts_with("parse yaml:"));
    }

    #[test]
    fn missing_file_reports_path() {
        let path = std::env::temp_dir().join("evmindex-config-does-not-exist.yaml");
        let err = AppConfig::load_from_file(&path).unwrap_err();
        match err {
            ConfigError::Read { path: p, .. } => assert_eq!(p, path),
            other => panic!("expected Read, got {other:?}"),
        }
    }

    #[test]
    fn loads_from_file() {
        let path = std::env::temp_dir().join(format!(
            "evmindex-config-{}-load.yaml",
            std::process::id()
        ));
        std::fs::write(&path, TWO_CHAINS).unwrap();
        let cfg = AppConfig::load_from_file(&path);
        std::fs::remove_file(&path).ok();

        let cfg = cfg.unwrap();
        assert_eq!(cfg.chains[1].name, "base");
        assert_eq!(cfg.chains[1].chain_id, 8453);
    }
}
