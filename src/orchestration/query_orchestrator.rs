use crate::config::BrokerQueryConfig;
use crate::error::Result;
use crate::messaging::{default_alert_source, AlertSource};
use crate::query_managers::{BrokerQueryManager, CycleReport, LasairProfile, QueryManager};
use crate::registry::TargetRegistry;
use chrono::Utc;
use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{info, instrument, warn};

/// Drives the query cycles of every broker manager
pub struct QueryOrchestrator {
    registry: Arc<TargetRegistry>,
    managers: Vec<Arc<dyn QueryManager>>,
    cycle_interval: Duration,
}

impl std::fmt::Debug for QueryOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryOrchestrator")
            .field("managers", &self.manager_names())
            .field("targets", &self.registry.len())
            .field("cycle_interval", &self.cycle_interval)
            .finish()
    }
}

impl QueryOrchestrator {
    pub fn new(registry: Arc<TargetRegistry>, cycle_interval: Duration) -> Self {
        Self {
            registry,
            managers: Vec::new(),
            cycle_interval,
        }
    }

    /// Build a manager for every broker section present in `config`.
    ///
    /// `alert_source` is the pub/sub client handed to brokers with a kafka
    /// section. Without one, brokers with a kafka section use
    /// [`default_alert_source`].
    pub fn from_config(
        config: &BrokerQueryConfig,
        registry: Arc<TargetRegistry>,
        alert_source: Option<Arc<dyn AlertSource>>,
    ) -> Result<Self> {
        config.validate()?;
        let mut orchestrator = Self::new(
            registry.clone(),
            Duration::from_secs(config.cycle_interval_seconds),
        );

        if let Some(lasair) = &config.lasair {
            let mut builder = BrokerQueryManager::builder(
                LasairProfile,
                lasair.clone(),
                registry.clone(),
                config.data_directory.clone(),
            );
            let source = match (&alert_source, &lasair.kafka) {
                (Some(source), _) => Some(source.clone()),
                (None, Some(_)) => default_alert_source(),
                (None, None) => None,
            };
            if let Some(source) = source {
                builder = builder.alert_source(source);
            }
            orchestrator.add_manager(Arc::new(builder.build()?));
        }

        if orchestrator.managers.is_empty() {
            warn!("No broker sections configured; cycles will do nothing");
        }
        Ok(orchestrator)
    }

    pub fn add_manager(&mut self, manager: Arc<dyn QueryManager>) {
        info!(broker = %manager.name(), "Query manager registered");
        self.managers.push(manager);
    }

    pub fn manager_names(&self) -> Vec<String> {
        self.managers.iter().map(|m| m.name().to_string()).collect()
    }

    pub fn registry(&self) -> &Arc<TargetRegistry> {
        &self.registry
    }

    /// Run one cycle of every manager, concurrently, all with the same reference time
    #[instrument(skip(self), fields(managers = self.managers.len()))]
    pub async fn run_cycle(&self) -> Vec<CycleReport> {
        let t_ref = Utc::now();
        let reports = join_all(self.managers.iter().map(|manager| manager.run_cycle(t_ref))).await;
        info!(
            targets = self.registry.len(),
            brokers = reports.len(),
            "Orchestrator cycle complete"
        );
        reports
    }

    /// Run cycles on the configured cadence until `shutdown` resolves.
    ///
    /// A cycle in progress is allowed to finish. Returns the number of
    /// completed cycles.
    pub async fn run_until<F>(&self, shutdown: F) -> u64
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(self.cycle_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        let mut cycles = 0u64;
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!(cycles = cycles, "Shutdown requested; stopping query cycles");
                    return cycles;
                }
                _ = ticker.tick() => {
                    self.run_cycle().await;
                    cycles += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BrokerConfig, KafkaConfig};
    use crate::messaging::ChannelAlertSource;
    use crate::models::Alert;
    use crate::query_managers::{BootstrapOutcome, FetchOutcome, LoadOutcome, PropagationOutcome};
    use async_trait::async_trait;
    use chrono::DateTime;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    #[derive(Default)]
    struct CountingManager {
        cycles: AtomicUsize,
    }

    #[async_trait]
    impl QueryManager for CountingManager {
        fn name(&self) -> &str {
            "counting"
        }
        async fn listen(&self) -> Vec<Alert> {
            self.cycles.fetch_add(1, Ordering::SeqCst);
            Vec::new()
        }
        async fn process_alerts(&self, alerts: Vec<Alert>, _t_ref: DateTime<Utc>) -> Vec<Alert> {
            alerts
        }
        fn bootstrap_targets(&self, _alerts: &[Alert], _t_ref: DateTime<Utc>) -> BootstrapOutcome {
            BootstrapOutcome::default()
        }
        async fn alert_fetch_ids(&self, _alerts: &[Alert], _t_ref: DateTime<Utc>) -> Vec<String> {
            Vec::new()
        }
        async fn schedule_fetch(&self, _t_ref: DateTime<Utc>) -> Vec<String> {
            Vec::new()
        }
        async fn fetch(&self, _object_ids: &[String]) -> FetchOutcome {
            FetchOutcome::default()
        }
        async fn load_cache(&self, _ids: Option<&[String]>, _t_ref: DateTime<Utc>) -> LoadOutcome {
            LoadOutcome::default()
        }
        fn propagate(&self, _alerts: &[Alert]) -> PropagationOutcome {
            PropagationOutcome::default()
        }
    }

    #[tokio::test]
    async fn test_run_cycle_runs_every_manager() {
        let mut orchestrator =
            QueryOrchestrator::new(Arc::new(TargetRegistry::new()), Duration::from_secs(60));
        let first = Arc::new(CountingManager::default());
        let second = Arc::new(CountingManager::default());
        orchestrator.add_manager(first.clone());
        orchestrator.add_manager(second.clone());

        let reports = orchestrator.run_cycle().await;
        assert_eq!(reports.len(), 2);
        assert_eq!(first.cycles.load(Ordering::SeqCst), 1);
        assert_eq!(second.cycles.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_until_stops_on_shutdown() {
        let mut orchestrator =
            QueryOrchestrator::new(Arc::new(TargetRegistry::new()), Duration::from_secs(60));
        let manager = Arc::new(CountingManager::default());
        orchestrator.add_manager(manager.clone());

        let cycles = orchestrator
            .run_until(tokio::time::sleep(Duration::from_secs(150)))
            .await;
        assert_eq!(cycles, 3);
        assert_eq!(manager.cycles.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_from_config_requires_lasair_token() {
        let dir = TempDir::new().unwrap();
        let mut lasair = BrokerConfig::with_token("t");
        lasair.client_token = None;
        let config = BrokerQueryConfig {
            data_directory: dir.path().to_path_buf(),
            cycle_interval_seconds: 60,
            lasair: Some(lasair),
        };
        assert!(QueryOrchestrator::from_config(&config, Arc::new(TargetRegistry::new()), None).is_err());
    }

    #[test]
    fn test_from_config_without_brokers() {
        let orchestrator = QueryOrchestrator::from_config(
            &BrokerQueryConfig::default(),
            Arc::new(TargetRegistry::new()),
            None,
        )
        .unwrap();
        assert!(orchestrator.manager_names().is_empty());
    }

    #[tokio::test]
    async fn test_from_config_hands_alert_source_to_kafka_brokers() {
        let dir = TempDir::new().unwrap();
        let mut lasair = BrokerConfig::with_token("t");
        lasair.bulk_query.base_url = "http://127.0.0.1:1".to_string();
        lasair.bulk_query.request_timeout_seconds = 1;
        lasair.kafka = Some(KafkaConfig {
            host: "localhost:9092".to_string(),
            group_id: "tests".to_string(),
            topics: vec!["lasair_sn".to_string()],
            poll_timeout_seconds: 0.01,
            alerts_per_topic: 5,
        });
        let config = BrokerQueryConfig {
            data_directory: dir.path().to_path_buf(),
            cycle_interval_seconds: 60,
            lasair: Some(lasair),
        };

        let bus = ChannelAlertSource::new();
        bus.publish_json("lasair_sn", &serde_json::json!({"objectId": "ZTF24abc", "candid": 1}));
        let orchestrator = QueryOrchestrator::from_config(
            &config,
            Arc::new(TargetRegistry::new()),
            Some(Arc::new(bus.clone())),
        )
        .unwrap();

        let reports = orchestrator.run_cycle().await;
        assert_eq!(reports[0].alerts, 1);
        assert!(orchestrator.registry().contains("ZTF24abc"));
    }

    #[cfg(not(feature = "kafka"))]
    #[test]
    fn test_no_network_client_without_kafka_feature() {
        assert!(default_alert_source().is_none());
    }
}
