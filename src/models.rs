//! Data model shared by the engine, the result store and the HTTP API.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use crate::percentiles::PercentileStats;

/// A single load test request: what to hit, how hard, and with what.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestConfig {
    pub endpoint: String,
    pub method: String,
    #[serde(default)]
    pub body: String,
    /// Desired number of parallel workers.
    pub concurrency: usize,
    /// Total number of requests to send.
    pub requests: usize,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl TestConfig {
    /// Upper-cases the method and trims the endpoint.
    pub fn normalized(mut self) -> Self {
        self.method = self.method.trim().to_uppercase();
        self.endpoint = self.endpoint.trim().to_string();
        self
    }
}

/// Result of one request attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestOutcome {
    /// 0 when no response was obtained.
    pub status_code: u16,
    #[serde(with = "crate::utils::nanos")]
    pub duration: Duration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RequestOutcome {
    /// A request that produced an HTTP response.
    pub fn completed(status_code: u16, duration: Duration) -> Self {
        Self {
            status_code,
            duration,
            error: None,
        }
    }

    /// A request that failed before a status code was obtained.
    pub fn failed(error: impl Into<String>, duration: Duration) -> Self {
        Self {
            status_code: 0,
            duration,
            error: Some(error.into()),
        }
    }

    /// Only an error-free exchange answered with exactly 200 counts.
    pub fn is_success(&self) -> bool {
        self.error.as_deref().map_or(true, str::is_empty) && self.status_code == 200
    }
}

/// Aggregate statistics for one finished test run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSummary {
    pub total_requests: usize,
    pub success: usize,
    pub failures: usize,
    /// Percent of `total_requests`, 0 to 100.
    pub success_rate: f64,
    /// Percent of `total_requests`, 0 to 100.
    pub failure_rate: f64,
    #[serde(with = "crate::utils::clock")]
    pub total_time: Duration,
    /// Duration of all requests, failures included, divided by the success count.
    #[serde(with = "crate::utils::clock")]
    pub average_time: Duration,
    pub status_codes: BTreeMap<u16, usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_percentiles: Option<PercentileStats>,
    pub results: Vec<RequestOutcome>,
}
