//! evmindex-core — backfill planning for the evmindex block ingester.
//!
//! # Architecture
//!
//! ```text
//! Orchestrator (one task per chain)
//!     └── Planner::plan(ctx, from, queue)
//!             ├── HeadSource      (queried once: FixedHead / Retrying<_> / RPC)
//!             ├── PlanContext     (cancellation + deadline, checked per send)
//!             └── mpsc::Sender    (bounded, consumer-owned; sole backpressure)
//! ```

pub mod builder;
pub mod context;
pub mod error;
pub mod head;
pub mod planner;

pub use builder::{PlannerBuilder, DEFAULT_SAFETY_WINDOW};
pub use context::{Interrupt, PlanContext};
pub use error::{HeadError, PlanError};
pub use head::{FixedHead, HeadSource, RetryConfig, Retrying};
pub use planner::{
    batch_ranges, safe_target, BatchRanges, PlanState, PlanSummary, Planner, DEFAULT_BATCH_SIZE,
};
