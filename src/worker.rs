use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::executor::execute_request;
use crate::models::{RequestOutcome, TestConfig};

/// Configuration for a worker task.
pub struct WorkerConfig {
    pub task_id: usize,
    /// Number of requests this worker sends, one after another.
    pub quota: usize,
    pub test: Arc<TestConfig>,
    /// Shared limiter bounding in-flight workers across concurrent test runs.
    pub limiter: Option<Arc<Semaphore>>,
}

/// Runs a single worker: sends `quota` requests sequentially and emits every
/// outcome on `results`.
///
/// Each worker builds its own client so connection pools are not shared
/// between workers. If the client cannot be built, every request in the
/// quota is reported as a failed outcome so the run still accounts for it.
pub async fn run_worker(config: WorkerConfig, results: mpsc::Sender<RequestOutcome>) {
    // Held for the lifetime of the worker; dropping it frees the slot.
    let _permit = match config.limiter {
        Some(ref limiter) => match limiter.clone().acquire_owned().await {
            Ok(permit) => Some(permit),
            Err(e) => {
                warn!(
                    task_id = config.task_id,
                    error = %e,
                    "Worker limiter closed, running unbounded"
                );
                None
            }
        },
        None => None,
    };

    debug!(
        task_id = config.task_id,
        quota = config.quota,
        endpoint = %config.test.endpoint,
        "Worker starting"
    );

    let client = match reqwest::Client::builder().build() {
        Ok(client) => client,
        Err(e) => {
            error!(
                task_id = config.task_id,
                error = %e,
                "Failed to build HTTP client"
            );
            let message = format!("failed to build HTTP client: {}", e);
            for _ in 0..config.quota {
                let outcome = RequestOutcome::failed(message.clone(), Duration::ZERO);
                if results.send(outcome).await.is_err() {
                    break;
                }
            }
            return;
        }
    };

    for sent in 0..config.quota {
        let outcome = execute_request(&client, &config.test).await;

        if results.send(outcome).await.is_err() {
            warn!(
                task_id = config.task_id,
                sent = sent,
                "Result stream closed before worker finished"
            );
            return;
        }
    }

    debug!(task_id = config.task_id, "Worker finished");
}

/// Spawns one worker per quota, each with its own handle on the result stream.
pub fn spawn_workers(
    quotas: &[usize],
    test: Arc<TestConfig>,
    limiter: Option<Arc<Semaphore>>,
    results: &mpsc::Sender<RequestOutcome>,
) -> Vec<JoinHandle<()>> {
    quotas
        .iter()
        .enumerate()
        .map(|(task_id, &quota)| {
            let worker_config = WorkerConfig {
                task_id,
                quota,
                test: test.clone(),
                limiter: limiter.clone(),
            };
            tokio::spawn(run_worker(worker_config, results.clone()))
        })
        .collect()
}

/// Spawns the completion gate.
///
/// Waits for every worker, then drops the last sender it owns, which closes
/// the result stream. Workers that panicked are logged and count as finished.
pub fn spawn_completion_gate(
    workers: Vec<JoinHandle<()>>,
    results: mpsc::Sender<RequestOutcome>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let total = workers.len();
        for (task_id, handle) in workers.into_iter().enumerate() {
            if let Err(e) = handle.await {
                error!(task_id = task_id, error = %e, "Worker task failed");
            }
        }
        debug!(workers = total, "All workers finished, closing result stream");
        drop(results);
    })
}
