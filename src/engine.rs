use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::aggregator::aggregate;
use crate::models::{TestConfig, TestSummary};
use crate::partition::partition;
use crate::worker::{spawn_completion_gate, spawn_workers};

/// Dispatches a fixed request budget across a worker pool and aggregates the
/// outcomes.
///
/// The config is assumed valid; see `config_validation` for the checks the
/// HTTP layer applies before calling in.
#[derive(Clone, Default)]
pub struct LoadEngine {
    limiter: Option<Arc<Semaphore>>,
}

impl LoadEngine {
    /// An engine whose parallelism is bounded only by each run's concurrency.
    pub fn new() -> Self {
        Self::default()
    }

    /// An engine whose workers share `limiter` with every other run using it.
    pub fn with_worker_limit(limiter: Arc<Semaphore>) -> Self {
        Self {
            limiter: Some(limiter),
        }
    }

    /// Runs one test to completion and returns its summary.
    pub async fn run(&self, config: TestConfig) -> TestSummary {
        let total_requests = config.requests;
        let quotas = partition(total_requests, config.concurrency);

        info!(
            endpoint = %config.endpoint,
            method = %config.method,
            requests = total_requests,
            concurrency = config.concurrency,
            workers = quotas.len(),
            "Starting load test"
        );

        // Sized to the whole budget so producers never wait on the consumer.
        let (tx, rx) = mpsc::channel(total_requests.max(1));
        let start = Instant::now();

        let workers = spawn_workers(&quotas, Arc::new(config), self.limiter.clone(), &tx);
        let gate = spawn_completion_gate(workers, tx);

        let summary = aggregate(rx, total_requests, start).await;

        // The stream only closes once the gate has dropped its sender.
        await_gate(gate).await;

        info!(
            total_requests = summary.total_requests,
            success = summary.success,
            failures = summary.failures,
            success_rate = summary.success_rate,
            total_time_ms = summary.total_time.as_millis() as u64,
            average_time_ms = summary.average_time.as_millis() as u64,
            "Load test finished"
        );
        if let Some(ref latency) = summary.latency_percentiles {
            info!(latency = %latency.format(), "Successful request latency");
        }

        summary
    }
}

/// Runs one test with an unbounded engine.
pub async fn execute_test(config: TestConfig) -> TestSummary {
    LoadEngine::new().run(config).await
}

/// Joins the completion gate, logging a panicked or cancelled gate.
async fn await_gate(gate: JoinHandle<()>) {
    if let Err(e) = gate.await {
        error!(error = %e, "Completion gate task failed");
    }
}
