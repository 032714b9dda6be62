//! # Query Managers
//!
//! One query manager per broker. A cycle runs strictly in order:
//!
//! ```text
//! listen -> process -> bootstrap -> fetch(alert ids) -> schedule -> fetch(due ids) -> load -> propagate
//! ```
//!
//! Each stage consumes the previous stage's output and reports what it did
//! as a plain value; per-item failures are logged and counted, never
//! returned as errors. [`QueryManager`] is the per-broker interface and
//! [`BrokerQueryManager`] the shared implementation, parameterized by a
//! [`BrokerProfile`] such as [`lasair::LasairProfile`].

pub mod bootstrap;
pub mod cache;
pub mod fetcher;
pub mod lasair;
pub mod listener;
pub mod manager;
pub mod processor;
pub mod propagator;
pub mod scheduler;

pub use bootstrap::{guess_coordinates, BootstrapOutcome, TargetBootstrapper, DEFAULT_COORDINATE_GUESSES};
pub use cache::{merge, LightcurveCache, MergeDecision};
pub use fetcher::{BatchFetcher, FetchOutcome, FetchedLightcurve, LightcurveSource};
pub use lasair::{LasairHttpClient, LasairProfile};
pub use listener::AlertListener;
pub use manager::{BrokerProfile, BrokerQueryManager, BrokerQueryManagerBuilder};
pub use processor::{resolve_alert_timestamp, AlertProcessor, TimestampSource};
pub use propagator::{PropagationOutcome, UpdatePropagator};
pub use scheduler::LightcurveScheduler;

use crate::logging::log_stage_operation;
use crate::models::Alert;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Instant;
use tracing::info;

/// What the load stage did with each id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadOutcome {
    /// Cached lightcurve accepted onto the target
    pub loaded: Vec<String>,
    /// Cache identical to what the target holds, or shorter
    pub skipped: Vec<String>,
    /// No usable cache file, or no target to attach it to
    pub missing: Vec<String>,
    /// Targets created from their first coordinate-bearing lightcurve
    pub created: Vec<String>,
}

/// Summary of one full cycle
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub broker: String,
    pub t_ref: DateTime<Utc>,
    pub alerts: usize,
    pub bootstrap: BootstrapOutcome,
    pub alert_fetch: FetchOutcome,
    pub scheduled_fetch: FetchOutcome,
    pub load: LoadOutcome,
    pub propagation: PropagationOutcome,
    pub elapsed_ms: u64,
}

/// The per-broker query interface
#[async_trait]
pub trait QueryManager: Send + Sync {
    fn name(&self) -> &str;

    /// Poll the broker's topics within the configured budget
    async fn listen(&self) -> Vec<Alert>;

    /// Stamp `alert_timestamp` and persist each alert
    async fn process_alerts(&self, alerts: Vec<Alert>, t_ref: DateTime<Utc>) -> Vec<Alert>;

    fn bootstrap_targets(&self, alerts: &[Alert], t_ref: DateTime<Utc>) -> BootstrapOutcome;

    /// Distinct alert object ids whose cache is older than the alert refresh interval
    async fn alert_fetch_ids(&self, alerts: &[Alert], t_ref: DateTime<Utc>) -> Vec<String>;

    /// Tracked objects whose cache is older than the scheduled refresh interval
    async fn schedule_fetch(&self, t_ref: DateTime<Utc>) -> Vec<String>;

    async fn fetch(&self, object_ids: &[String]) -> FetchOutcome;

    /// Attach cached lightcurves to targets; `None` loads every tracked object
    async fn load_cache(&self, object_ids: Option<&[String]>, t_ref: DateTime<Utc>) -> LoadOutcome;

    fn propagate(&self, alerts: &[Alert]) -> PropagationOutcome;

    /// Run every stage once, in order
    async fn run_cycle(&self, t_ref: DateTime<Utc>) -> CycleReport {
        let started = Instant::now();
        let broker = self.name().to_string();

        let alerts = self.listen().await;
        log_stage_operation(&broker, "listen", alerts.len(), None);

        let alerts = self.process_alerts(alerts, t_ref).await;

        let bootstrap = self.bootstrap_targets(&alerts, t_ref);
        log_stage_operation(&broker, "bootstrap", bootstrap.added.len(), Some("targets added"));

        let alert_ids = self.alert_fetch_ids(&alerts, t_ref).await;
        log_stage_operation(&broker, "alert_fetch", alert_ids.len(), Some("alert lightcurves due"));
        let alert_fetch = self.fetch(&alert_ids).await;

        let due = self.schedule_fetch(t_ref).await;
        log_stage_operation(&broker, "schedule", due.len(), Some("stale lightcurves due"));
        let scheduled_fetch = self.fetch(&due).await;

        let load = self.load_cache(None, t_ref).await;
        log_stage_operation(&broker, "load", load.loaded.len(), Some("lightcurves updated"));

        let propagation = self.propagate(&alerts);
        log_stage_operation(&broker, "propagate", propagation.notified.len(), None);

        let elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            broker = %broker,
            alerts = alerts.len(),
            fetched = alert_fetch.succeeded.len() + scheduled_fetch.succeeded.len(),
            failed = alert_fetch.failed.len() + scheduled_fetch.failed.len(),
            elapsed_ms = elapsed_ms,
            "Query cycle complete"
        );

        CycleReport {
            broker,
            t_ref,
            alerts: alerts.len(),
            bootstrap,
            alert_fetch,
            scheduled_fetch,
            load,
            propagation,
            elapsed_ms,
        }
    }
}
