//! Folds request outcomes into a [`TestSummary`].
//!
//! The aggregator is the single consumer of the result stream. It keeps
//! running counts while outcomes arrive and derives rates and averages once,
//! after the stream has closed.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::debug;

use crate::models::{RequestOutcome, TestSummary};
use crate::percentiles::LatencyHistogram;

/// Running totals for one test run.
#[derive(Default)]
pub struct Aggregator {
    results: Vec<RequestOutcome>,
    status_codes: BTreeMap<u16, usize>,
    success: usize,
    total_duration: Duration,
    latency: LatencyHistogram,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-sizes the result buffer for an expected number of outcomes.
    pub fn with_capacity(expected: usize) -> Self {
        Self {
            results: Vec::with_capacity(expected),
            ..Self::default()
        }
    }

    /// Adds one outcome to the running totals.
    pub fn consume(&mut self, outcome: RequestOutcome) {
        *self.status_codes.entry(outcome.status_code).or_insert(0) += 1;
        self.total_duration += outcome.duration;

        if outcome.is_success() {
            self.success += 1;
            self.latency.record(outcome.duration);
        }

        self.results.push(outcome);
    }

    fn len(&self) -> usize {
        self.results.len()
    }

    /// Derives the final summary.
    ///
    /// Rates are computed against `total_requests`, not against the number
    /// of outcomes seen, and are both zero when `total_requests` is zero.
    /// The average divides the duration of every outcome, failures included,
    /// by the success count.
    pub fn finish(self, total_requests: usize, total_time: Duration) -> TestSummary {
        let failures = total_requests.saturating_sub(self.success);

        let average_time = match u32::try_from(self.success) {
            Ok(0) => Duration::ZERO,
            Ok(count) => self.total_duration / count,
            Err(_) => Duration::from_secs_f64(
                self.total_duration.as_secs_f64() / self.success as f64,
            ),
        };

        let (success_rate, failure_rate) = if total_requests > 0 {
            (
                self.success as f64 / total_requests as f64 * 100.0,
                failures as f64 / total_requests as f64 * 100.0,
            )
        } else {
            (0.0, 0.0)
        };

        TestSummary {
            total_requests,
            success: self.success,
            failures,
            success_rate,
            failure_rate,
            total_time,
            average_time,
            status_codes: self.status_codes,
            latency_percentiles: self.latency.stats(),
            results: self.results,
        }
    }
}

/// Re-aggregates an already collected outcome sequence.
///
/// Pure: the same outcomes, request count and total time always produce the
/// same summary.
pub fn summarize(
    outcomes: impl IntoIterator<Item = RequestOutcome>,
    total_requests: usize,
    total_time: Duration,
) -> TestSummary {
    let mut aggregator = Aggregator::with_capacity(total_requests);
    for outcome in outcomes {
        aggregator.consume(outcome);
    }
    aggregator.finish(total_requests, total_time)
}

/// Drains the result stream until every sender is gone, then finalizes.
///
/// `total_time` is measured from `start` to the moment the stream closed.
pub async fn aggregate(
    mut results: mpsc::Receiver<RequestOutcome>,
    total_requests: usize,
    start: Instant,
) -> TestSummary {
    let mut aggregator = Aggregator::with_capacity(total_requests);

    while let Some(outcome) = results.recv().await {
        aggregator.consume(outcome);
    }

    let total_time = start.elapsed();
    debug!(
        collected = aggregator.len(),
        expected = total_requests,
        total_time_ms = total_time.as_millis() as u64,
        "Result stream closed"
    );

    aggregator.finish(total_requests, total_time)
}
