use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::info;
use tracing_subscriber::EnvFilter;

use earthquake::api::{serve, AppState};
use earthquake::config::{LogFormat, ServerConfig};
use earthquake::engine::LoadEngine;
use earthquake::metrics::register_metrics;
use earthquake::runner::TestRunner;
use earthquake::store::{FileStore, MemoryStore, ResultStore};

/// Prints helpful configuration documentation.
fn print_config_help() {
    eprintln!("Optional environment variables:");
    eprintln!("  PORT                    - HTTP API port (default: 8080)");
    eprintln!("  BIND_ADDR               - HTTP API bind address (default: 0.0.0.0)");
    eprintln!("  RESULTS_DIR             - Directory for JSON result files (default: in-memory)");
    eprintln!(
        "  MAX_STORED_RESULTS      - Results kept in memory when RESULTS_DIR is unset; oldest are evicted (default: 1000)"
    );
    eprintln!(
        "  MAX_IN_FLIGHT_WORKERS   - Max workers running at once across all tests (default: 512, must be > 0)"
    );
    eprintln!("  LOG_FORMAT              - text or json (default: text)");
    eprintln!("  RUST_LOG                - Log filter, e.g. info or earthquake=debug (default: info)");
    eprintln!("  METRIC_NAMESPACE        - Prometheus metric namespace (default: earthquake)");
}

fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = match ServerConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}\n", e);
            print_config_help();
            std::process::exit(1);
        }
    };

    init_logging(config.log_format);
    register_metrics()?;
    config.log_summary();

    let store: Arc<dyn ResultStore> = match config.results_dir {
        Some(ref dir) => {
            let store = FileStore::open(dir.clone()).await?;
            info!(dir = %store.dir().display(), "Persisting results to disk");
            Arc::new(store)
        }
        None => Arc::new(MemoryStore::with_capacity(config.max_stored_results)),
    };

    let limiter = Arc::new(Semaphore::new(config.max_in_flight_workers));
    let runner = TestRunner::new(LoadEngine::with_worker_limit(limiter), store);

    serve(config.socket_addr(), AppState::new(runner)).await?;

    info!("Server stopped");
    Ok(())
}
