//! Error types for head queries and backfill planning.

use thiserror::Error;

use crate::context::Interrupt;
use crate::planner::PlanState;

/// Errors a [`HeadSource`](crate::head::HeadSource) can report.
#[derive(Debug, Error)]
pub enum HeadError {
    /// The underlying source could not answer (network error, timeout, ...).
    #[error("head unavailable: {0}")]
    Unavailable(String),

    /// The caller's context was cancelled while the query was in flight.
    #[error("head query cancelled")]
    Cancelled,

    /// The caller's deadline passed while the query was in flight.
    #[error("head query deadline exceeded")]
    DeadlineExceeded,
}

impl HeadError {
    /// Returns `true` if the error is transient and the query may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    /// Returns `true` if the query stopped because of the caller's context.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }
}

impl From<Interrupt> for HeadError {
    fn from(interrupt: Interrupt) -> Self {
        match interrupt {
            Interrupt::Cancelled => Self::Cancelled,
            Interrupt::DeadlineExceeded => Self::DeadlineExceeded,
        }
    }
}

/// Errors returned by [`Planner::plan`](crate::planner::Planner::plan).
///
/// Numbers already handed to the output queue before a failure stay there;
/// `delivered` reports how many that was so the caller can resume.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("planner: no head source configured")]
    MissingHeadSource,

    #[error("planner: head: {0}")]
    HeadQueryFailed(#[source] HeadError),

    #[error("planner: cancelled after {delivered} blocks")]
    Cancelled { delivered: u64 },

    #[error("planner: deadline exceeded after {delivered} blocks")]
    DeadlineExceeded { delivered: u64 },

    #[error("planner: output queue closed after {delivered} blocks")]
    SinkClosed { delivered: u64 },
}

impl PlanError {
    pub(crate) fn interrupted(interrupt: Interrupt, delivered: u64) -> Self {
        match interrupt {
            Interrupt::Cancelled => Self::Cancelled { delivered },
            Interrupt::DeadlineExceeded => Self::DeadlineExceeded { delivered },
        }
    }

    /// Returns `true` if the call ended because the caller cancelled it or its
    /// deadline passed, including while the head was being queried.
    pub fn is_interrupted(&self) -> bool {
        match self {
            Self::Cancelled { .. } | Self::DeadlineExceeded { .. } => true,
            Self::HeadQueryFailed(e) => e.is_interrupted(),
            Self::MissingHeadSource | Self::SinkClosed { .. } => false,
        }
    }

    /// Number of block numbers sent before the call stopped.
    pub fn delivered(&self) -> u64 {
        match self {
            Self::Cancelled { delivered }
            | Self::DeadlineExceeded { delivered }
            | Self::SinkClosed { delivered } => *delivered,
            Self::MissingHeadSource | Self::HeadQueryFailed(_) => 0,
        }
    }

    /// The terminal state the plan call ended in.
    pub fn terminal_state(&self) -> PlanState {
        match self {
            Self::Cancelled { .. } | Self::DeadlineExceeded { .. } => PlanState::Cancelled,
            Self::MissingHeadSource | Self::HeadQueryFailed(_) | Self::SinkClosed { .. } => {
                PlanState::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn head_query_failure_keeps_source() {
        let err = PlanError::HeadQueryFailed(HeadError::Unavailable("connection refused".into()));
        assert_eq!(
            err.to_string(),
            "planner: head: head unavailable: connection refused"
        );
        assert!(err.source().is_some());
        assert!(!err.is_interrupted());
        assert_eq!(err.terminal_state(), PlanState::Failed);
    }

    #[test]
    fn interrupted_head_query_counts_as_interruption() {
        let err = PlanError::HeadQueryFailed(HeadError::Cancelled);
        assert!(err.is_interrupted());
        assert_eq!(err.delivered(), 0);
    }

    #[test]
    fn cancellation_reports_delivered() {
        let err = PlanError::interrupted(Interrupt::DeadlineExceeded, 42);
        assert!(matches!(err, PlanError::DeadlineExceeded { delivered: 42 }));
        assert_eq!(err.delivered(), 42);
        assert_eq!(err.terminal_state(), PlanState::Cancelled);
    }

    #[test]
    fn only_unavailable_is_retryable() {
        assert!(HeadError::Unavailable("timeout".into()).is_retryable());
        assert!(!HeadError::Cancelled.is_retryable());
        assert!(!HeadError::DeadlineExceeded.is_retryable());
    }
}
