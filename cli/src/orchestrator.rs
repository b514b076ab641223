//! Runs one planner per configured chain, each on its own task.

use std::collections::HashMap;

use tokio::sync::mpsc;
use tokio::task::{self, JoinError, JoinSet};

use evmindex_config::ChainConfig;
use evmindex_core::{FixedHead, PlanContext, PlanError, PlanSummary};

/// Why a chain's backfill pass did not finish.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error("chain task died: {0}")]
    TaskDied(String),

    #[error("consumer task died: {0}")]
    ConsumerDied(String),
}

impl ChainError {
    /// True when the pass was stopped by cancellation or a deadline.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Plan(e) if e.is_interrupted())
    }
}

/// Result of one chain's backfill pass.
#[derive(Debug)]
pub struct ChainReport {
    pub chain: String,
    pub outcome: Result<PlanSummary, ChainError>,
    /// Block numbers the consumer pulled off the queue.
    pub consumed: u64,
}

impl ChainReport {
    /// Cancellation and deadlines are expected during shutdown, not failures.
    pub fn is_failure(&self) -> bool {
        matches!(&self.outcome, Err(e) if !e.is_interrupted())
    }
}

/// Launches a planner + consumer pair per chain and waits for all of them.
pub struct Orchestrator {
    chains: Vec<ChainConfig>,
    head_offset: u64,
    preview: usize,
}

impl Orchestrator {
    /// `head_offset` fixes each chain's head at `start_block + head_offset`;
    /// `preview` is how many planned numbers per chain are logged at info.
    pub fn new(chains: Vec<ChainConfig>, head_offset: u64, preview: usize) -> Self {
        Self {
            chains,
            head_offset,
            preview,
        }
    }

    /// Plan every chain concurrently. Each chain gets a child of `root`, so
    /// cancelling `root` stops them all. Returns one report per chain.
    pub async fn run(&self, root: &PlanContext) -> Vec<ChainReport> {
        let mut tasks = JoinSet::new();
        let mut names = HashMap::with_capacity(self.chains.len());
        for chain in &self.chains {
            let name = chain.name.clone();
            let handle = tasks.spawn(run_chain(
                chain.clone(),
                root.child(),
                self.head_offset,
                self.preview,
            ));
            names.insert(handle.id(), name);
        }
        collect_reports(tasks, names).await
    }
}

/// Join every chain task. A task that panicked or was aborted still yields a
/// failed report under its chain name.
async fn collect_reports(
    mut tasks: JoinSet<ChainReport>,
    mut names: HashMap<task::Id, String>,
) -> Vec<ChainReport> {
    let mut reports = Vec::with_capacity(names.len());
    while let Some(joined) = tasks.join_next_with_id().await {
        match joined {
            Ok((_, report)) => reports.push(report),
            Err(e) => {
                let chain = names
                    .remove(&e.id())
                    .unwrap_or_else(|| format!("task-{}", e.id()));
                tracing::error!(chain = %chain, error = %e, "chain task died");
                reports.push(ChainReport {
                    chain,
                    outcome: Err(ChainError::TaskDied(e.to_string())),
                    consumed: 0,
                });
            }
        }
    }
    reports
}

async fn run_chain(
    chain: ChainConfig,
    ctx: PlanContext,
    head_offset: u64,
    preview: usize,
) -> ChainReport {
    let head = chain.start_block.saturating_add(head_offset);
    let planner = chain.planner_builder().heads(FixedHead(head)).build();
    let (tx, rx) = mpsc::channel(chain.queue_capacity());
    let consumer = tokio::spawn(drain(chain.name.clone(), rx, preview));

    tracing::info!(
        chain = %chain.name,
        from = chain.start_block,
        head,
        batch = planner.effective_batch_size(),
        safety_window = planner.safety_window,
        "planner started"
    );

    let planned = planner.plan(&ctx, chain.start_block, &tx).await;
    drop(tx);
    let (outcome, consumed) = settle(planned, consumer.await);

    match &outcome {
        Ok(summary) => tracing::info!(
            chain = %chain.name,
            target = summary.target,
            emitted = summary.emitted,
            next_from = ?summary.resume_from(),
            "planner done"
        ),
        Err(ChainError::Plan(e)) if e.is_interrupted() => tracing::warn!(
            chain = %chain.name,
            delivered = e.delivered(),
            reason = %e,
            "planner cancelled"
        ),
        Err(ChainError::Plan(e)) => tracing::error!(
            chain = %chain.name,
            delivered = e.delivered(),
            error = %e,
            "planner failed"
        ),
        Err(e) => tracing::error!(chain = %chain.name, consumed, error = %e, "planner failed"),
    }

    ChainReport {
        chain: chain.name,
        outcome,
        consumed,
    }
}

/// Combine the planner's result with the consumer's. A consumer that died
/// fails the chain even if planning itself succeeded.
fn settle(
    planned: Result<PlanSummary, PlanError>,
    consumer: Result<u64, JoinError>,
) -> (Result<PlanSummary, ChainError>, u64) {
    match consumer {
        Ok(consumed) => (planned.map_err(ChainError::from), consumed),
        Err(e) => (Err(ChainError::ConsumerDied(e.to_string())), 0),
    }
}

/// Stand-in for the fetch/ingest stage: pulls numbers until the planner
/// drops its sender.
async fn drain(chain: String, mut rx: mpsc::Receiver<u64>, preview: usize) -> u64 {
    let mut consumed = 0u64;
    while let Some(number) = rx.recv().await {
        if consumed < preview as u64 {
            tracing::info!(chain = %chain, planned_block = number, "planned");
        } else {
            tracing::trace!(chain = %chain, planned_block = number, "planned");
        }
        consumed += 1;
    }
    consumed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(name: &str, start_block: u64, safety_window: u64) -> ChainConfig {
        ChainConfig {
            name: name.into(),
            chain_id: 1,
            rpc_http: String::new(),
            rpc_ws: String::new(),
            start_block,
            batch_size: 100,
            receipts_mode: "block".into(),
            safety_window,
            channel_capacity: 8,
        }
    }

    #[tokio::test]
    async fn every_chain_is_planned_to_its_target() {
        let orchestrator = Orchestrator::new(
            vec![chain("ethereum", 100, 6), chain("base", 5_000, 64)],
            500,
            3,
        );
        let mut reports = orchestrator.run(&PlanContext::new()).await;
        reports.sort_by(|a, b| a.chain.cmp(&b.chain));

        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|r| !r.is_failure()));

        // base: head 5500, target 5436
        let base = reports[0].outcome.as_ref().unwrap();
        assert_eq!(base.target, 5_436);
        assert_eq!(base.emitted, 437);
        assert_eq!(reports[0].consumed, 437);

        // ethereum: head 600, target 594
        let eth = reports[1].outcome.as_ref().unwrap();
        assert_eq!(eth.target, 594);
        assert_eq!(eth.emitted, 495);
        assert_eq!(reports[1].consumed, 495);
    }

    #[tokio::test]
    async fn cancelled_root_is_not_a_failure() {
        let root = PlanContext::new();
        root.cancel();
        let orchestrator = Orchestrator::new(vec![chain("ethereum", 0, 0)], 1_000_000, 0);
        let reports = orchestrator.run(&root).await;

        assert_eq!(reports.len(), 1);
        let err = reports[0].outcome.as_ref().unwrap_err();
        assert!(err.is_interrupted());
        assert!(!reports[0].is_failure());
        assert_eq!(reports[0].consumed, 0);
    }

    #[tokio::test]
    async fn start_beyond_safe_head_plans_nothing() {
        // head = start + 3 is within the safety window.
        let orchestrator = Orchestrator::new(vec![chain("ethereum", 1_000, 6)], 3, 10);
        let reports = orchestrator.run(&PlanContext::new()).await;

        let summary = reports[0].outcome.as_ref().unwrap();
        assert_eq!(summary.emitted, 0);
        assert_eq!(reports[0].consumed, 0);
    }

    async fn exploding_chain() -> ChainReport {
        panic!("rpc client blew up")
    }

    async fn exploding_consumer() -> u64 {
        panic!("ingest stage crashed")
    }

    #[tokio::test]
    async fn panicked_chain_task_is_reported_as_failure() {
        let mut tasks = JoinSet::new();
        let mut names = HashMap::new();
        let ok = tasks.spawn(async {
            ChainReport {
                chain: "ethereum".into(),
                outcome: Err(ChainError::Plan(PlanError::Cancelled { delivered: 3 })),
                consumed: 3,
            }
        });
        names.insert(ok.id(), "ethereum".to_string());
        let boom = tasks.spawn(exploding_chain());
        names.insert(boom.id(), "base".to_string());

        let mut reports = collect_reports(tasks, names).await;
        reports.sort_by(|a, b| a.chain.cmp(&b.chain));

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].chain, "base");
        assert!(reports[0].is_failure());
        assert!(matches!(reports[0].outcome, Err(ChainError::TaskDied(_))));
        assert_eq!(reports[1].chain, "ethereum");
        assert!(!reports[1].is_failure());
    }

    #[tokio::test]
    async fn dead_consumer_fails_a_finished_plan() {
        let summary = PlanSummary {
            head: 600,
            target: 594,
            from: 100,
            emitted: 495,
            state: evmindex_core::PlanState::Done,
        };
        let died = tokio::spawn(exploding_consumer()).await;
        let (outcome, consumed) = settle(Ok(summary), died);

        assert!(matches!(outcome, Err(ChainError::ConsumerDied(_))));
        assert_eq!(consumed, 0);
        let report = ChainReport {
            chain: "ethereum".into(),
            outcome,
            consumed,
        };
        assert!(report.is_failure());
    }

    #[tokio::test]
    async fn plan_error_passes_through_settle() {
        let (outcome, consumed) = settle(Err(PlanError::SinkClosed { delivered: 2 }), Ok(2));
        assert!(matches!(
            outcome,
            Err(ChainError::Plan(PlanError::SinkClosed { delivered: 2 }))
        ));
        assert_eq!(consumed, 2);
    }
}
