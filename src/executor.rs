use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, Request, Url};
use std::error::Error as StdError;
use std::str::FromStr;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

use crate::errors::ErrorCategory;
use crate::metrics::{
    status_code_label, CONCURRENT_REQUESTS, REQUEST_DURATION_SECONDS, REQUEST_ERRORS_BY_CATEGORY,
    REQUEST_STATUS_CODES, REQUEST_TOTAL,
};
use crate::models::{RequestOutcome, TestConfig};

/// Reasons a request cannot be constructed from a [`TestConfig`].
#[derive(Error, Debug)]
pub enum RequestBuildError {
    #[error("invalid HTTP method '{0}'")]
    InvalidMethod(String),

    #[error("invalid URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("invalid header name '{0}'")]
    InvalidHeaderName(String),

    #[error("invalid value for header '{0}'")]
    InvalidHeaderValue(String),

    #[error("failed to build request: {0}")]
    Builder(#[from] reqwest::Error),
}

/// Builds one request from the test configuration.
///
/// Headers are applied with insert semantics, so names that differ only by
/// case collapse to a single header and the last one applied wins. The
/// config's headers are a map, so which of those variants is applied last
/// is unspecified. An empty body sends no body at all.
pub fn build_request(client: &Client, config: &TestConfig) -> Result<Request, RequestBuildError> {
    let method = Method::from_bytes(config.method.as_bytes())
        .map_err(|_| RequestBuildError::InvalidMethod(config.method.clone()))?;

    let url = Url::parse(&config.endpoint).map_err(|e| RequestBuildError::InvalidUrl {
        url: config.endpoint.clone(),
        message: e.to_string(),
    })?;

    let mut headers = HeaderMap::with_capacity(config.headers.len());
    for (name, value) in &config.headers {
        let header_name = HeaderName::from_str(name.trim())
            .map_err(|_| RequestBuildError::InvalidHeaderName(name.clone()))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|_| RequestBuildError::InvalidHeaderValue(name.clone()))?;
        headers.insert(header_name, header_value);
    }

    let mut builder = client.request(method, url).headers(headers);
    if !config.body.is_empty() {
        builder = builder.body(config.body.clone());
    }

    Ok(builder.build()?)
}

/// Performs one request/response cycle and records what happened.
///
/// Never fails: construction and transport errors come back as an outcome
/// with status 0 and an error message. Construction errors carry a zero
/// duration since nothing was sent.
pub async fn execute_request(client: &Client, config: &TestConfig) -> RequestOutcome {
    REQUEST_TOTAL.inc();

    let request = match build_request(client, config) {
        Ok(request) => request,
        Err(e) => {
            debug!(
                endpoint = %config.endpoint,
                method = %config.method,
                error = %e,
                "Request could not be built"
            );
            record_error(ErrorCategory::InvalidRequest);
            REQUEST_STATUS_CODES
                .with_label_values(&[status_code_label(0)])
                .inc();
            return RequestOutcome::failed(e.to_string(), Duration::ZERO);
        }
    };

    CONCURRENT_REQUESTS.inc();
    let start = Instant::now();
    let result = client.execute(request).await;
    let duration = start.elapsed();

    let outcome = match result {
        Ok(mut response) => {
            let status = response.status().as_u16();

            // Stream and discard the body so the connection can be reused
            // without buffering the whole payload.
            while let Ok(Some(_chunk)) = response.chunk().await {}

            if let Some(category) = ErrorCategory::from_status_code(status) {
                debug!(status_code = status, error_category = %category, "Non-success status");
                record_error(category);
            }

            debug!(
                endpoint = %config.endpoint,
                status_code = status,
                duration_ms = duration.as_millis() as u64,
                "Request completed"
            );
            RequestOutcome::completed(status, duration)
        }
        Err(e) => {
            let category = ErrorCategory::from_reqwest_error(&e);
            record_error(category);

            let message = error_chain(&e);
            debug!(
                endpoint = %config.endpoint,
                error = %message,
                error_category = %category,
                "Request failed"
            );
            RequestOutcome::failed(message, duration)
        }
    };

    CONCURRENT_REQUESTS.dec();
    REQUEST_STATUS_CODES
        .with_label_values(&[status_code_label(outcome.status_code)])
        .inc();
    REQUEST_DURATION_SECONDS.observe(duration.as_secs_f64());

    outcome
}

fn record_error(category: ErrorCategory) {
    REQUEST_ERRORS_BY_CATEGORY
        .with_label_values(&[category.label()])
        .inc();
}

/// Joins an error with its sources, e.g. "error sending request: connection refused".
fn error_chain(error: &dyn StdError) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let cause_msg = cause.to_string();
        if !message.contains(&cause_msg) {
            message.push_str(": ");
            message.push_str(&cause_msg);
        }
        source = cause.source();
    }
    message
}
