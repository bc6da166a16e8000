//! HTTP API for submitting tests and fetching their results.
//!
//! - `POST /test` accepts one test config or an array of them and answers
//!   immediately with a test id; the tests run in the background.
//! - `GET /result?id=<id>` returns the stored record (or, for a batch id, the
//!   records of every test in the batch).
//! - `GET /metrics` serves the Prometheus text exposition.

use std::net::SocketAddr;

use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config_validation::validate_test_config;
use crate::metrics::gather_metrics_string;
use crate::models::TestConfig;
use crate::runner::TestRunner;
use crate::utils::{is_valid_test_id, new_test_id};

/// Shared state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub runner: TestRunner,
}

impl AppState {
    pub fn new(runner: TestRunner) -> Self {
        Self { runner }
    }
}

/// Body of `POST /test`: a single config or a batch.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TestSubmission {
    Batch(Vec<TestConfig>),
    Single(TestConfig),
}

#[derive(Debug, Serialize)]
struct TestAccepted {
    test_id: String,
}

/// Routes one request.
pub async fn handle(req: Request<Body>, state: AppState) -> Result<Response<Body>, hyper::Error> {
    debug!(method = %req.method(), path = %req.uri().path(), "API request");

    match req.uri().path() {
        "/test" => handle_test_request(req, state).await,
        "/result" => handle_get_result(req, state).await,
        "/metrics" => Ok(handle_metrics(&req)),
        _ => Ok(text_response(StatusCode::NOT_FOUND, "not found")),
    }
}

async fn handle_test_request(
    req: Request<Body>,
    state: AppState,
) -> Result<Response<Body>, hyper::Error> {
    if req.method() != Method::POST {
        return Ok(text_response(
            StatusCode::METHOD_NOT_ALLOWED,
            "Method not allowed",
        ));
    }

    let bytes = hyper::body::to_bytes(req.into_body()).await?;
    let submission: TestSubmission = match serde_json::from_slice(&bytes) {
        Ok(submission) => submission,
        Err(e) => {
            debug!(error = %e, "Rejected unparseable test submission");
            return Ok(text_response(
                StatusCode::BAD_REQUEST,
                "Invalid configuration",
            ));
        }
    };

    let (configs, batch) = match submission {
        TestSubmission::Single(config) => (vec![config], false),
        TestSubmission::Batch(configs) => (configs, true),
    };

    if configs.is_empty() {
        return Ok(text_response(
            StatusCode::BAD_REQUEST,
            "Invalid configuration",
        ));
    }

    for (index, config) in configs.iter().enumerate() {
        if let Err(e) = validate_test_config(config) {
            let message = if batch {
                format!("Invalid configuration at index {}: {}", index, e)
            } else {
                format!("Invalid configuration: {}", e)
            };
            return Ok(text_response(StatusCode::BAD_REQUEST, &message));
        }
    }

    let test_id = new_test_id();
    info!(test_id = %test_id, tests = configs.len(), "Accepted test submission");

    if batch {
        for config in configs {
            spawn_run(&state, config, new_test_id(), Some(test_id.clone()));
        }
    } else {
        for config in configs {
            spawn_run(&state, config, test_id.clone(), None);
        }
    }

    Ok(json_response(StatusCode::OK, &TestAccepted { test_id }))
}

fn spawn_run(state: &AppState, config: TestConfig, id: String, test_request_id: Option<String>) {
    let runner = state.runner.clone();
    tokio::spawn(async move {
        // Failures are logged and counted by the runner.
        let _ = runner.run(config.normalized(), id, test_request_id).await;
    });
}

async fn handle_get_result(
    req: Request<Body>,
    state: AppState,
) -> Result<Response<Body>, hyper::Error> {
    if req.method() != Method::GET {
        return Ok(text_response(
            StatusCode::METHOD_NOT_ALLOWED,
            "Method not allowed",
        ));
    }

    let test_id = match req.uri().query().and_then(|q| query_param(q, "id")) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => return Ok(text_response(StatusCode::BAD_REQUEST, "Missing test ID")),
    };

    if !is_valid_test_id(&test_id) {
        return Ok(text_response(StatusCode::BAD_REQUEST, "Invalid test ID"));
    }

    let store = state.runner.store();

    match store.find(&test_id).await {
        Ok(Some(record)) => return Ok(json_response(StatusCode::OK, &record)),
        Ok(None) => {}
        Err(e) => {
            error!(test_id = %test_id, error = %e, "Failed to load test result");
            return Ok(text_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to load test result",
            ));
        }
    }

    match store.find_by_request(&test_id).await {
        Ok(records) if !records.is_empty() => Ok(json_response(StatusCode::OK, &records)),
        Ok(_) => Ok(text_response(StatusCode::NOT_FOUND, "Test result not found")),
        Err(e) => {
            error!(test_id = %test_id, error = %e, "Failed to load batch results");
            Ok(text_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to load test result",
            ))
        }
    }
}

fn handle_metrics(req: &Request<Body>) -> Response<Body> {
    if req.method() != Method::GET {
        return text_response(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed");
    }

    match gather_metrics_string() {
        Ok(text) => {
            let mut response = Response::new(Body::from(text));
            response.headers_mut().insert(
                CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            );
            response
        }
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            text_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics")
        }
    }
}

/// Finds `key` in a `a=1&b=2` query string.
fn query_param<'a>(query: &'a str, key: &str) -> Option<&'a str> {
    query.split('&').find_map(|pair| match pair.split_once('=') {
        Some((k, v)) if k == key => Some(v),
        None if pair == key => Some(""),
        _ => None,
    })
}

fn text_response(status: StatusCode, message: &str) -> Response<Body> {
    let mut response = Response::new(Body::from(format!("{}\n", message)));
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Response<Body> {
    match serde_json::to_vec(value) {
        Ok(body) => {
            let mut response = Response::new(Body::from(body));
            *response.status_mut() = status;
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            response
        }
        Err(e) => {
            error!(error = %e, "Failed to serialize response body");
            text_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

/// Serves the API on `addr` until Ctrl-C is received.
pub async fn serve(addr: SocketAddr, state: AppState) -> Result<(), hyper::Error> {
    let make_svc = make_service_fn(move |_conn| {
        let state = state.clone();
        async move {
            Ok::<_, hyper::Error>(service_fn(move |req| {
                let state_inner = state.clone();
                async move { handle(req, state_inner).await }
            }))
        }
    });

    let server = Server::try_bind(&addr)?.serve(make_svc);
    info!(
        addr = %addr,
        "API listening: POST /test, GET /result?id=<id>, GET /metrics"
    );

    server
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            info!("Shutdown signal received, draining connections");
        })
        .await
}
