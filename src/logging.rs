//! # Structured Logging Module
//!
//! Environment-aware structured logging for the broker query managers.
//! Output is human-readable by default and JSON lines when
//! `BROKER_QUERY_LOG_FORMAT=json`; `RUST_LOG` overrides the level.

use std::sync::OnceLock;
use std::time::Duration;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging once per process
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(get_log_level(&environment)));
        let json_output = std::env::var("BROKER_QUERY_LOG_FORMAT")
            .map(|format| format.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let layer = if json_output {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .json()
                .with_filter(filter)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(true)
                .with_filter(filter)
                .boxed()
        };

        // Use try_init to avoid panic if a global subscriber is already set
        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(
            pid = std::process::id(),
            environment = %environment,
            json = json_output,
            "Structured logging initialized"
        );
    });
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("BROKER_QUERY_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// Log structured data for one cycle stage
pub fn log_stage_operation(broker: &str, stage: &str, count: usize, details: Option<&str>) {
    tracing::info!(
        broker = %broker,
        stage = %stage,
        count = count,
        details = details,
        "STAGE_OPERATION"
    );
}

/// Log the outcome of one bulk fetch call
pub fn log_fetch_summary(
    broker: &str,
    succeeded: usize,
    failed: usize,
    unattempted: usize,
    elapsed: Duration,
) {
    tracing::info!(
        broker = %broker,
        succeeded = succeeded,
        failed = failed,
        unattempted = unattempted,
        elapsed_ms = elapsed.as_millis() as u64,
        "FETCH_SUMMARY"
    );
}
