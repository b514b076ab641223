//! Backfill planner: streams the block numbers that are safe to ingest.
//!
//! One [`Planner::plan`] call:
//! 1. queries the head source once,
//! 2. computes `target = head - safety_window` (floored at zero),
//! 3. sends every number in `[from, target]` to the output queue in order,
//!    one batch of `batch_size` numbers at a time.
//!
//! Each single send is raced against the caller's [`PlanContext`], so
//! cancellation is observed within one pending send regardless of batch size.
//! The queue's capacity is the only backpressure; the planner buffers nothing.

use std::fmt;
use std::iter::FusedIterator;
use std::ops::RangeInclusive;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::builder::PlannerBuilder;
use crate::context::PlanContext;
use crate::error::PlanError;
use crate::head::HeadSource;

/// Batch size used when none (or zero) is configured.
pub const DEFAULT_BATCH_SIZE: u64 = 100;

/// Highest block number that is safe to plan for a given head.
pub fn safe_target(head: u64, safety_window: u64) -> u64 {
    head.saturating_sub(safety_window)
}

/// Split `[from, target]` into contiguous inclusive ranges of at most
/// `batch_size` numbers. A zero batch size means [`DEFAULT_BATCH_SIZE`].
pub fn batch_ranges(from: u64, target: u64, batch_size: u64) -> BatchRanges {
    BatchRanges {
        next: from,
        target,
        batch_size: effective_batch_size(batch_size),
        finished: from > target,
    }
}

fn effective_batch_size(batch_size: u64) -> u64 {
    if batch_size == 0 {
        DEFAULT_BATCH_SIZE
    } else {
        batch_size
    }
}

/// Iterator returned by [`batch_ranges`].
#[derive(Debug, Clone)]
pub struct BatchRanges {
    next: u64,
    target: u64,
    batch_size: u64,
    finished: bool,
}

impl Iterator for BatchRanges {
    type Item = RangeInclusive<u64>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let end = self
            .next
            .saturating_add(self.batch_size - 1)
            .min(self.target);
        let range = self.next..=end;
        if end == self.target {
            self.finished = true;
        } else {
            self.next = end + 1;
        }
        Some(range)
    }
}

impl FusedIterator for BatchRanges {}

// ─── PlanState ────────────────────────────────────────────────────────────────

/// Lifecycle of a single plan call.
///
/// ```text
/// Idle → QueryingHead → Emitting → Done
///   │          │           ├─────→ Cancelled
///   └──────────┴───────────┴─────→ Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanState {
    Idle,
    QueryingHead,
    Emitting,
    Done,
    Cancelled,
    Failed,
}

impl PlanState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Cancelled | Self::Failed)
    }

    /// Returns `true` if a plan may move from `self` to `next`.
    pub fn can_advance_to(self, next: PlanState) -> bool {
        use PlanState::*;
        matches!(
            (self, next),
            (Idle, QueryingHead)
                | (Idle, Failed)
                | (QueryingHead, Emitting)
                | (QueryingHead, Failed)
                | (Emitting, Done)
                | (Emitting, Cancelled)
                | (Emitting, Failed)
        )
    }
}

impl fmt::Display for PlanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::QueryingHead => write!(f, "querying-head"),
            Self::Emitting => write!(f, "emitting"),
            Self::Done => write!(f, "done"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

fn advance(state: &mut PlanState, next: PlanState) {
    debug_assert!(
        state.can_advance_to(next),
        "illegal plan transition {state} -> {next}"
    );
    *state = next;
}

// ─── Planner ──────────────────────────────────────────────────────────────────

/// Outcome of a successful plan call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanSummary {
    /// Head reported by the head source.
    pub head: u64,
    /// Highest block number planned for (`head - safety_window`, floored at 0).
    pub target: u64,
    /// First block number requested.
    pub from: u64,
    /// How many numbers were sent. Zero when `from > target`.
    pub emitted: u64,
    /// Always [`PlanState::Done`].
    pub state: PlanState,
}

impl PlanSummary {
    /// Block number the next plan call should start from to continue
    /// where this one stopped.
    ///
    /// `None` once `u64::MAX` itself has been emitted: there is nothing left
    /// to plan.
    pub fn resume_from(&self) -> Option<u64> {
        if self.emitted == 0 {
            Some(self.from)
        } else {
            self.target.checked_add(1)
        }
    }
}

/// Emits historical block numbers up to `head - safety_window`.
///
/// Configuration only; the planner keeps no progress between calls and
/// never mutates its fields. Tracking where to resume is the caller's job.
#[derive(Clone, Default)]
pub struct Planner {
    pub heads: Option<Arc<dyn HeadSource>>,
    pub batch_size: u64,
    pub safety_window: u64,
}

impl fmt::Debug for Planner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Planner")
            .field("heads", &self.heads.as_ref().map(|_| "<dyn HeadSource>"))
            .field("batch_size", &self.batch_size)
            .field("safety_window", &self.safety_window)
            .finish()
    }
}

impl Planner {
    pub fn new(heads: impl HeadSource + 'static, batch_size: u64, safety_window: u64) -> Self {
        Self {
            heads: Some(Arc::new(heads)),
            batch_size,
            safety_window,
        }
    }

    pub fn builder() -> PlannerBuilder {
        PlannerBuilder::new()
    }

    /// The batch size a plan call will use.
    pub fn effective_batch_size(&self) -> u64 {
        effective_batch_size(self.batch_size)
    }

    /// Stream `[from, head - safety_window]` into `out`.
    ///
    /// Blocks on `out` while it is full. Returns early with
    /// [`PlanError::Cancelled`] / [`PlanError::DeadlineExceeded`] when `ctx`
    /// stops, or [`PlanError::SinkClosed`] when the receiver is dropped.
    /// Numbers already sent stay sent.
    pub async fn plan(
        &self,
        ctx: &PlanContext,
        from: u64,
        out: &mpsc::Sender<u64>,
    ) -> Result<PlanSummary, PlanError> {
        let mut state = PlanState::Idle;

        let Some(heads) = self.heads.as_ref() else {
            advance(&mut state, PlanState::Failed);
            return Err(PlanError::MissingHeadSource);
        };
        let batch_size = self.effective_batch_size();

        advance(&mut state, PlanState::QueryingHead);
        let head = match heads.head_number(ctx).await {
            Ok(head) => head,
            Err(e) => {
                advance(&mut state, PlanState::Failed);
                return Err(PlanError::HeadQueryFailed(e));
            }
        };
        let target = safe_target(head, self.safety_window);

        advance(&mut state, PlanState::Emitting);
        let mut delivered = 0u64;
        let done = ctx.done();
        tokio::pin!(done);
        for batch in batch_ranges(from, target, batch_size) {
            for number in batch {
                tokio::select! {
                    biased;
                    interrupt = &mut done => {
                        advance(&mut state, PlanState::Cancelled);
                        return Err(PlanError::interrupted(interrupt, delivered));
                    }
                    sent = out.send(number) => {
                        if sent.is_err() {
                            advance(&mut state, PlanState::Failed);
                            return Err(PlanError::SinkClosed { delivered });
                        }
                        delivered += 1;
                    }
                }
            }
        }

        advance(&mut state, PlanState::Done);
        Ok(PlanSummary {
            head,
            target,
            from,
            emitted: delivered,
            state,
        })
    }
}
