use std::sync::Arc;

use tracing::{error, info};

use crate::engine::LoadEngine;
use crate::metrics::{TESTS_IN_FLIGHT, TEST_RUNS_TOTAL};
use crate::models::TestConfig;
use crate::store::{ResultStore, StoreError, TestRecord};
use crate::utils::unix_timestamp;

/// Runs tests and persists their results.
#[derive(Clone)]
pub struct TestRunner {
    engine: LoadEngine,
    store: Arc<dyn ResultStore>,
}

impl TestRunner {
    pub fn new(engine: LoadEngine, store: Arc<dyn ResultStore>) -> Self {
        Self { engine, store }
    }

    pub fn store(&self) -> &Arc<dyn ResultStore> {
        &self.store
    }

    /// Executes `config`, then saves the outcome under `id`.
    ///
    /// A persistence failure is returned to the caller; the summary is lost
    /// in that case but the process keeps running.
    pub async fn run(
        &self,
        config: TestConfig,
        id: String,
        test_request_id: Option<String>,
    ) -> Result<TestRecord, StoreError> {
        TESTS_IN_FLIGHT.inc();
        let summary = self.engine.run(config.clone()).await;
        TESTS_IN_FLIGHT.dec();

        let record = TestRecord {
            id,
            test_request_id,
            config,
            test_summary: summary,
            created_at: unix_timestamp(),
        };

        match self.store.save(&record).await {
            Ok(()) => {
                TEST_RUNS_TOTAL.with_label_values(&["completed"]).inc();
                info!(
                    test_id = %record.id,
                    success = record.test_summary.success,
                    failures = record.test_summary.failures,
                    "Test result saved"
                );
                Ok(record)
            }
            Err(e) => {
                TEST_RUNS_TOTAL.with_label_values(&["store_failed"]).inc();
                error!(test_id = %record.id, error = %e, "Failed to save test result");
                Err(e)
            }
        }
    }
}
