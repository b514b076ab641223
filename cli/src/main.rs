//! evmindex — plan historical block backfills for every configured chain.
//!
//! Usage:
//! ```bash
//! evmindex --config config/chains.yaml
//! EVMI_CONFIG=/etc/evmindex/chains.yaml evmindex --head-offset 1000 --preview 20
//! ```

mod orchestrator;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueHint};
use tokio::signal;

use evmindex_config::{init_tracing, AppConfig, ConfigError, LogConfig};
use evmindex_core::PlanContext;

use crate::orchestrator::Orchestrator;

#[derive(Parser, Debug)]
#[command(name = "evmindex", version, about = "Backfill planner for EVM chains")]
struct Args {
    /// Path to the chains YAML file.
    #[arg(
        long,
        env = "EVMI_CONFIG",
        default_value = "config/chains.yaml",
        value_hint(ValueHint::FilePath)
    )]
    config: PathBuf,

    /// Fixed head used for each chain: start_block + this offset.
    #[arg(long, default_value_t = 500)]
    head_offset: u64,

    /// Planned block numbers per chain to log at info level.
    #[arg(long, default_value_t = 10)]
    preview: usize,

    /// Give up on planning after this many seconds.
    #[arg(long)]
    timeout_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let loaded = AppConfig::load_from_file(&args.config);
    let log_config = loaded
        .as_ref()
        .map(|cfg| cfg.logging.clone())
        .unwrap_or_else(|_| LogConfig::default());
    init_tracing(&log_config).context("initialise logging")?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting evmindex");

    let path = std::fs::canonicalize(&args.config).unwrap_or_else(|_| args.config.clone());
    let cfg = require_config(loaded, &path)?;
    tracing::info!(chains = cfg.chains.len(), path = %path.display(), "loaded config");

    for chain in &cfg.chains {
        tracing::info!(
            name = %chain.name,
            id = chain.chain_id,
            start = chain.start_block,
            batch = chain.batch_size,
            mode = %chain.receipts_mode,
            "configured chain"
        );
    }

    let mut root = PlanContext::new();
    if let Some(secs) = args.timeout_secs {
        root = root.with_timeout(Duration::from_secs(secs));
    }
    tokio::spawn(cancel_on_signal(root.clone()));

    let orchestrator = Orchestrator::new(cfg.chains, args.head_offset, args.preview);
    let reports = orchestrator.run(&root).await;

    let failed: Vec<&str> = reports
        .iter()
        .filter(|r| r.is_failure())
        .map(|r| r.chain.as_str())
        .collect();
    if !failed.is_empty() {
        anyhow::bail!("planning failed for chain(s): {}", failed.join(", "));
    }
    Ok(())
}

/// A config error is fatal. It is reported once, by `main`'s return value.
fn require_config(
    loaded: Result<AppConfig, ConfigError>,
    path: &Path,
) -> anyhow::Result<AppConfig> {
    loaded.with_context(|| format!("load config {}", path.display()))
}

/// Cancel `root` on Ctrl+C or SIGTERM.
async fn cancel_on_signal(root: PlanContext) {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = ctrl_c => tracing::info!("received Ctrl+C, cancelling planners"),
        () = terminate => tracing::info!("received SIGTERM, cancelling planners"),
    }
    root.cancel();
}
