//! Head sources: where the planner learns the current chain head.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::context::PlanContext;
use crate::error::HeadError;

/// Supplies the current chain head block number on demand.
///
/// The planner calls this exactly once per plan and does not retry, cache,
/// or rate-limit. Wrap an implementation in [`Retrying`] (or your own
/// decorator) when resilience is needed.
///
/// # Object Safety
/// The trait is object-safe and can be stored as `Arc<dyn HeadSource>`.
#[async_trait]
pub trait HeadSource: Send + Sync {
    /// Return the latest block number known to the source.
    async fn head_number(&self, ctx: &PlanContext) -> Result<u64, HeadError>;
}

#[async_trait]
impl<H: HeadSource + ?Sized> HeadSource for Arc<H> {
    async fn head_number(&self, ctx: &PlanContext) -> Result<u64, HeadError> {
        (**self).head_number(ctx).await
    }
}

#[async_trait]
impl<H: HeadSource + ?Sized> HeadSource for Box<H> {
    async fn head_number(&self, ctx: &PlanContext) -> Result<u64, HeadError> {
        (**self).head_number(ctx).await
    }
}

/// A head source that always answers with the same block number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedHead(pub u64);

#[async_trait]
impl HeadSource for FixedHead {
    async fn head_number(&self, _ctx: &PlanContext) -> Result<u64, HeadError> {
        Ok(self.0)
    }
}

// ─── Retrying ─────────────────────────────────────────────────────────────────

/// Exponential backoff settings for [`Retrying`].
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not counting the first try).
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_backoff: Duration,
    /// Upper bound on any single delay.
    pub max_backoff: Duration,
    /// Multiplier applied to the delay on each retry.
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Delay before the `attempt`-th retry (1-based), or `None` once retries
    /// are exhausted.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_retries {
            return None;
        }
        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let base_ms =
            self.initial_backoff.as_millis() as f64 * self.multiplier.max(1.0).powi(exponent);
        let capped = base_ms.min(self.max_backoff.as_millis() as f64);
        Some(Duration::from_millis(capped as u64))
    }
}

/// Retries transient [`HeadError::Unavailable`] failures of the wrapped source.
///
/// Waits between attempts are raced against the caller's context, so a
/// cancellation or deadline ends the query without waiting out the backoff.
#[derive(Debug, Clone)]
pub struct Retrying<H> {
    inner: H,
    config: RetryConfig,
}

impl<H: HeadSource> Retrying<H> {
    pub fn new(inner: H, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    pub fn inner(&self) -> &H {
        &self.inner
    }
}

#[async_trait]
impl<H: HeadSource> HeadSource for Retrying<H> {
    async fn head_number(&self, ctx: &PlanContext) -> Result<u64, HeadError> {
        let mut attempt = 0u32;
        loop {
            let err = match self.inner.head_number(ctx).await {
                Ok(head) => return Ok(head),
                Err(e) if e.is_retryable() => e,
                Err(e) => return Err(e),
            };
            attempt += 1;
            let Some(delay) = self.config.delay_for(attempt) else {
                return Err(err);
            };
            tokio::select! {
                biased;
                interrupt = ctx.done() => return Err(interrupt.into()),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
