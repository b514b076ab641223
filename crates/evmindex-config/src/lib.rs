//! evmindex-config — YAML chain configuration and logging setup.
//!
//! ```yaml
//! chains:
//!   - name: ethereum
//!     chain_id: 1
//!     rpc_http: https://...
//!     rpc_ws: wss://...
//!     start_block: 19000000
//!     batch_size: 100
//!     receipts_mode: block
//! logging:
//!   level: info
//! ```

pub mod app;
pub mod error;
pub mod logging;

pub use app::{AppConfig, ChainConfig};
pub use error::ConfigError;
pub use logging::{init_tracing, LogConfig};
