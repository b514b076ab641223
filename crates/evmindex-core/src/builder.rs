//! Fluent builder API for creating planners.
//!
//! # Example
//!
//! ```rust
//! use evmindex_core::{FixedHead, PlannerBuilder};
//!
//! let planner = PlannerBuilder::new()
//!     .heads(FixedHead(19_000_500))
//!     .batch_size(500)
//!     .safety_window(12)
//!     .build();
//! assert_eq!(planner.effective_batch_size(), 500);
//! ```

use std::sync::Arc;

use crate::head::HeadSource;
use crate::planner::{Planner, DEFAULT_BATCH_SIZE};

/// Confirmations required by default before a block is planned.
pub const DEFAULT_SAFETY_WINDOW: u64 = 6;

/// Fluent builder for [`Planner`].
#[derive(Debug, Clone)]
pub struct PlannerBuilder {
    planner: Planner,
}

impl Default for PlannerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PlannerBuilder {
    pub fn new() -> Self {
        Self {
            planner: Planner {
                heads: None,
                batch_size: DEFAULT_BATCH_SIZE,
                safety_window: DEFAULT_SAFETY_WINDOW,
            },
        }
    }

    /// Set the head source.
    pub fn heads(mut self, heads: impl HeadSource + 'static) -> Self {
        self.planner.heads = Some(Arc::new(heads));
        self
    }

    /// Set an already shared head source.
    pub fn shared_heads(mut self, heads: Arc<dyn HeadSource>) -> Self {
        self.planner.heads = Some(heads);
        self
    }

    /// Set the number of block numbers emitted per batch (0 = default).
    pub fn batch_size(mut self, size: u64) -> Self {
        self.planner.batch_size = size;
        self
    }

    /// Set the confirmation depth subtracted from the head.
    pub fn safety_window(mut self, window: u64) -> Self {
        self.planner.safety_window = window;
        self
    }

    /// Build the `Planner`.
    pub fn build(self) -> Planner {
        self.planner
    }
}
