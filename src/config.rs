use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use thiserror::Error;
use tracing::{info, warn};

use crate::store::DEFAULT_MEMORY_CAPACITY;

/// Errors raised while reading the service configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid {var} value '{value}': {message}")]
    InvalidValue {
        var: &'static str,
        value: String,
        message: String,
    },
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Service configuration, read from the environment at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: IpAddr,
    pub port: u16,
    /// Directory for JSON result files; results stay in memory when unset.
    pub results_dir: Option<PathBuf>,
    /// Process-wide cap on workers running at once, across all test runs.
    pub max_in_flight_workers: usize,
    /// Records the in-memory store keeps before evicting the oldest.
    pub max_stored_results: usize,
    pub log_format: LogFormat,
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let port_str = env::var("PORT").unwrap_or_else(|_| "8080".to_string());
        let port: u16 = port_str.trim().parse().map_err(|e| ConfigError::InvalidValue {
            var: "PORT",
            value: port_str.clone(),
            message: format!("{}", e),
        })?;

        let bind_str = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0".to_string());
        let bind_addr: IpAddr = bind_str.trim().parse().map_err(|e| ConfigError::InvalidValue {
            var: "BIND_ADDR",
            value: bind_str.clone(),
            message: format!("{}", e),
        })?;

        let results_dir = env::var("RESULTS_DIR")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        let workers_str =
            env::var("MAX_IN_FLIGHT_WORKERS").unwrap_or_else(|_| "512".to_string());
        let max_in_flight_workers: usize =
            workers_str
                .trim()
                .parse()
                .map_err(|e| ConfigError::InvalidValue {
                    var: "MAX_IN_FLIGHT_WORKERS",
                    value: workers_str.clone(),
                    message: format!("{}", e),
                })?;
        if max_in_flight_workers == 0 {
            return Err(ConfigError::InvalidValue {
                var: "MAX_IN_FLIGHT_WORKERS",
                value: workers_str,
                message: "must be greater than 0".to_string(),
            });
        }

        let stored_str = env::var("MAX_STORED_RESULTS")
            .unwrap_or_else(|_| DEFAULT_MEMORY_CAPACITY.to_string());
        let max_stored_results: usize =
            stored_str
                .trim()
                .parse()
                .map_err(|e| ConfigError::InvalidValue {
                    var: "MAX_STORED_RESULTS",
                    value: stored_str.clone(),
                    message: format!("{}", e),
                })?;
        if max_stored_results == 0 {
            return Err(ConfigError::InvalidValue {
                var: "MAX_STORED_RESULTS",
                value: stored_str,
                message: "must be greater than 0".to_string(),
            });
        }

        let format_str = env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
        let log_format = match format_str.trim().to_lowercase().as_str() {
            "text" => LogFormat::Text,
            "json" => LogFormat::Json,
            _ => {
                return Err(ConfigError::InvalidValue {
                    var: "LOG_FORMAT",
                    value: format_str,
                    message: "expected 'text' or 'json'".to_string(),
                })
            }
        };

        Ok(ServerConfig {
            bind_addr,
            port,
            results_dir,
            max_in_flight_workers,
            max_stored_results,
            log_format,
        })
    }

    /// Address the HTTP API listens on.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }

    /// Logs the configuration summary.
    pub fn log_summary(&self) {
        info!(
            addr = %self.socket_addr(),
            max_in_flight_workers = self.max_in_flight_workers,
            results_dir = ?self.results_dir,
            log_format = ?self.log_format,
            "Starting earthquake load test service"
        );

        if self.results_dir.is_none() {
            warn!(
                max_stored_results = self.max_stored_results,
                "RESULTS_DIR not set, results are kept in memory and the oldest are evicted"
            );
        }
    }
}
