//! Broker Query Binary
//!
//! Loads the broker query configuration, then runs query cycles on the
//! configured cadence until Ctrl-C.
//!
//! The config path comes from `BROKER_QUERY_CONFIG` (default
//! `config/broker-query.toml`). Alerts are received when the binary is built
//! with the `kafka` feature; otherwise it keeps caches fresh through scheduled
//! fetches only.

use anyhow::Context;
use broker_query::config::ConfigManager;
use broker_query::logging::init_structured_logging;
use broker_query::messaging::default_alert_source;
use broker_query::orchestration::QueryOrchestrator;
use broker_query::registry::TargetRegistry;
use std::sync::Arc;
use tracing::info;

const DEFAULT_CONFIG_PATH: &str = "config/broker-query.toml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_structured_logging();

    let config_path =
        std::env::var("BROKER_QUERY_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config_manager = ConfigManager::load_from_file(&config_path)
        .with_context(|| format!("loading configuration from {config_path}"))?;
    info!(config = %config_manager.debug_config(), "Configuration loaded");

    let registry = Arc::new(TargetRegistry::new());
    let orchestrator =
        QueryOrchestrator::from_config(config_manager.config(), registry, default_alert_source())
            .context("building query managers")?;
    info!(brokers = ?orchestrator.manager_names(), "Starting query cycles");

    let cycles = orchestrator
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl-C; stopping");
            }
        })
        .await;

    info!(cycles = cycles, targets = orchestrator.registry().len(), "Broker query stopped");
    Ok(())
}
