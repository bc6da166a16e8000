pub mod aggregator;
pub mod api;
pub mod config;
pub mod config_validation;
pub mod engine;
pub mod errors;
pub mod executor;
pub mod metrics;
pub mod models;
pub mod partition;
pub mod percentiles;
pub mod runner;
pub mod store;
pub mod utils;
pub mod worker;
