//! End-to-end tests for the dispatch-and-aggregate engine against mock targets.

use std::collections::HashMap;
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use earthquake::engine::{execute_test, LoadEngine};
use earthquake::models::{TestConfig, TestSummary};
use earthquake::partition::partition;

fn test_config(endpoint: String, method: &str, requests: usize, concurrency: usize) -> TestConfig {
    TestConfig {
        endpoint,
        method: method.to_string(),
        body: String::new(),
        concurrency,
        requests,
        headers: HashMap::new(),
    }
}

fn assert_invariants(summary: &TestSummary, requests: usize) {
    assert_eq!(summary.total_requests, requests);
    assert_eq!(summary.results.len(), requests);
    assert_eq!(summary.success + summary.failures, requests);
    assert_eq!(summary.status_codes.values().sum::<usize>(), requests);
    if requests > 0 {
        assert!((summary.success_rate + summary.failure_rate - 100.0).abs() < 1e-9);
    }
}

/// Alternates 200 and 500 responses.
struct Alternating {
    calls: AtomicUsize,
}

impl Respond for Alternating {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        if self.calls.fetch_add(1, Ordering::SeqCst) % 2 == 0 {
            ResponseTemplate::new(200)
        } else {
            ResponseTemplate::new(500)
        }
    }
}

/// A local address nothing is listening on.
fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}/", port)
}

#[tokio::test]
async fn all_requests_succeed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ok"))
        .respond_with(ResponseTemplate::new(200))
        .expect(10)
        .mount(&server)
        .await;

    let summary = execute_test(test_config(format!("{}/ok", server.uri()), "GET", 10, 3)).await;

    assert_invariants(&summary, 10);
    assert_eq!(summary.success, 10);
    assert_eq!(summary.failures, 0);
    assert_eq!(summary.success_rate, 100.0);
    assert_eq!(summary.failure_rate, 0.0);
    assert_eq!(summary.status_codes.get(&200), Some(&10));
    assert!(summary.average_time > Duration::ZERO);
    assert!(summary.total_time >= summary.average_time);
    assert_eq!(summary.latency_percentiles.as_ref().map(|p| p.count), Some(10));
}

#[tokio::test]
async fn non_200_responses_count_as_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(Alternating {
            calls: AtomicUsize::new(0),
        })
        .expect(8)
        .mount(&server)
        .await;

    let summary = execute_test(test_config(server.uri(), "GET", 8, 2)).await;

    assert_invariants(&summary, 8);
    assert_eq!(summary.success, 4);
    assert_eq!(summary.failures, 4);
    assert_eq!(summary.status_codes.get(&200), Some(&4));
    assert_eq!(summary.status_codes.get(&500), Some(&4));
    assert!(summary.results.iter().all(|r| r.error.is_none()));
}

#[tokio::test]
async fn created_status_is_not_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    let summary = execute_test(test_config(server.uri(), "POST", 3, 1)).await;

    assert_invariants(&summary, 3);
    assert_eq!(summary.success, 0);
    assert_eq!(summary.failure_rate, 100.0);
    assert_eq!(summary.average_time, Duration::ZERO);
}

#[tokio::test]
async fn more_workers_than_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(5)
        .mount(&server)
        .await;

    assert_eq!(partition(5, 10), vec![1, 1, 1, 1, 1]);

    let summary = execute_test(test_config(server.uri(), "GET", 5, 10)).await;

    assert_invariants(&summary, 5);
    assert_eq!(summary.success, 5);
}

#[tokio::test]
async fn sends_configured_headers_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/items"))
        .and(header("Content-Type", "application/json"))
        .and(header("X-Api-Key", "secret"))
        .and(body_string(r#"{"name":"quake"}"#))
        .respond_with(ResponseTemplate::new(200))
        .expect(6)
        .mount(&server)
        .await;

    let mut config = test_config(format!("{}/items", server.uri()), "PUT", 6, 2);
    config.body = r#"{"name":"quake"}"#.to_string();
    config
        .headers
        .insert("Content-Type".to_string(), "application/json".to_string());
    config
        .headers
        .insert("X-Api-Key".to_string(), "secret".to_string());

    let summary = execute_test(config).await;

    assert_invariants(&summary, 6);
    assert_eq!(summary.success, 6);
}

#[tokio::test]
async fn malformed_method_fails_every_request() {
    let summary =
        execute_test(test_config("http://127.0.0.1:9/".to_string(), "BAD METHOD", 4, 2)).await;

    assert_invariants(&summary, 4);
    assert_eq!(summary.success, 0);
    assert_eq!(summary.failures, 4);
    assert_eq!(summary.status_codes.get(&0), Some(&4));
    for outcome in &summary.results {
        assert_eq!(outcome.status_code, 0);
        assert_eq!(outcome.duration, Duration::ZERO);
        assert!(outcome.error.as_deref().is_some_and(|e| !e.is_empty()));
    }
}

#[tokio::test]
async fn connection_failures_are_recorded_as_data() {
    let summary = execute_test(test_config(closed_port_url(), "GET", 3, 3)).await;

    assert_invariants(&summary, 3);
    assert_eq!(summary.failures, 3);
    assert_eq!(summary.status_codes.get(&0), Some(&3));
    assert!(summary
        .results
        .iter()
        .all(|r| r.status_code == 0 && r.error.is_some()));
}

#[tokio::test]
async fn zero_requests_produces_empty_summary() {
    let summary = execute_test(test_config("http://127.0.0.1:9/".to_string(), "GET", 0, 4)).await;

    assert_invariants(&summary, 0);
    assert_eq!(summary.success_rate, 0.0);
    assert_eq!(summary.failure_rate, 0.0);
    assert_eq!(summary.average_time, Duration::ZERO);
    assert!(summary.status_codes.is_empty());
}

#[tokio::test]
async fn workers_run_in_parallel() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(300)))
        .mount(&server)
        .await;

    let summary = execute_test(test_config(server.uri(), "GET", 4, 4)).await;

    assert_invariants(&summary, 4);
    assert_eq!(summary.success, 4);
    // Sequential dispatch would take at least 1.2s.
    assert!(
        summary.total_time < Duration::from_millis(1_000),
        "total_time={:?}",
        summary.total_time
    );
}

#[tokio::test]
async fn shared_limiter_bounds_concurrent_runs() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(50)))
        .expect(12)
        .mount(&server)
        .await;

    let limiter = Arc::new(Semaphore::new(2));
    let engine = LoadEngine::with_worker_limit(limiter.clone());

    let (a, b) = tokio::join!(
        engine.run(test_config(server.uri(), "GET", 6, 3)),
        engine.run(test_config(server.uri(), "GET", 6, 3)),
    );

    assert_invariants(&a, 6);
    assert_invariants(&b, 6);
    assert_eq!(a.success + b.success, 12);
    assert_eq!(limiter.available_permits(), 2);
}
