//! # Broker Query Manager
//!
//! [`BrokerQueryManager`] wires the stage components together for one
//! broker. What differs between brokers (naming, coordinate field names, how
//! the bulk source is built from config) lives in a [`BrokerProfile`].
//!
//! Cache layout under the data directory:
//!
//! ```text
//! {data_directory}/{broker}/lightcurves/{objectId}.csv
//! {data_directory}/{broker}/alerts/{objectId}_{candid}.json
//! ```

use crate::config::{BrokerConfig, MissingFilePolicy, QueryParameters};
use crate::error::Result;
use crate::messaging::AlertSource;
use crate::models::{Alert, Lightcurve, TrackedObject};
use crate::query_managers::bootstrap::{BootstrapOutcome, TargetBootstrapper};
use crate::query_managers::cache::{backfill_coordinates, merge, LightcurveCache};
use crate::query_managers::fetcher::{BatchFetcher, FetchOutcome, LightcurveSource};
use crate::query_managers::listener::AlertListener;
use crate::query_managers::processor::AlertProcessor;
use crate::query_managers::propagator::{PropagationOutcome, UpdatePropagator};
use crate::query_managers::scheduler::LightcurveScheduler;
use crate::query_managers::{LoadOutcome, QueryManager};
use crate::registry::TargetRegistry;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Broker-specific behaviour plugged into [`BrokerQueryManager`]
pub trait BrokerProfile: Send + Sync {
    /// Lowercase name used for directories and log fields
    fn name(&self) -> &str;

    /// Name shown in target update messages
    fn label(&self) -> &str;

    /// Alert coordinate field pairs in priority order
    fn coordinate_guesses(&self) -> Vec<(String, String)>;

    /// Build the bulk lightcurve client from config
    fn lightcurve_source(&self, config: &BrokerConfig) -> Result<Arc<dyn LightcurveSource>>;
}

pub struct BrokerQueryManagerBuilder {
    profile: Arc<dyn BrokerProfile>,
    config: BrokerConfig,
    registry: Arc<TargetRegistry>,
    data_directory: PathBuf,
    alert_source: Option<Arc<dyn AlertSource>>,
    lightcurve_source: Option<Arc<dyn LightcurveSource>>,
}

impl BrokerQueryManagerBuilder {
    /// Pub/sub client used when the config has a kafka section
    pub fn alert_source(mut self, source: Arc<dyn AlertSource>) -> Self {
        self.alert_source = Some(source);
        self
    }

    /// Use this bulk source instead of the one the profile builds
    pub fn lightcurve_source(mut self, source: Arc<dyn LightcurveSource>) -> Self {
        self.lightcurve_source = Some(source);
        self
    }

    /// Validate the config and assemble the manager.
    ///
    /// Fails with a configuration error if required connection or credential
    /// fields are missing.
    pub fn build(self) -> Result<BrokerQueryManager> {
        let name = self.profile.name().to_string();
        self.config.validate(&name)?;

        let lightcurve_source = match self.lightcurve_source {
            Some(source) => source,
            None => self.profile.lightcurve_source(&self.config)?,
        };

        if self.config.kafka.is_some() && self.alert_source.is_none() {
            warn!(
                broker = %name,
                "Kafka configured but no pub/sub client available (build with the `kafka` feature); alerts disabled"
            );
        }

        let broker_directory = self.data_directory.join(&name);
        let cache = Arc::new(LightcurveCache::new(
            name.clone(),
            broker_directory.join("lightcurves"),
            self.config.cache.empty_result_policy,
        ));
        let alerts_directory = self
            .config
            .cache
            .save_alerts
            .then(|| broker_directory.join("alerts"));

        let manager = BrokerQueryManager {
            listener: AlertListener::new(name.clone(), self.alert_source, self.config.kafka.clone()),
            processor: AlertProcessor::new(name.clone(), alerts_directory),
            bootstrapper: TargetBootstrapper::new(
                name.clone(),
                self.registry.clone(),
                self.profile.coordinate_guesses(),
            ),
            scheduler: LightcurveScheduler::new(self.config.cache.missing_file_policy),
            fetcher: BatchFetcher::new(
                name.clone(),
                Some(lightcurve_source),
                cache.clone(),
                self.config.bulk_query.chunk_size,
                self.config.query_parameters.max_failed_queries,
                self.config.bulk_query.request_timeout(),
            ),
            propagator: UpdatePropagator::new(name.clone(), self.profile.label(), self.registry.clone()),
            cache,
            registry: self.registry,
            parameters: self.config.query_parameters.clone(),
            broker_directory,
            profile: self.profile,
            name,
        };

        info!(
            broker = %manager.name,
            directory = %manager.broker_directory.display(),
            listening = manager.listener.is_enabled(),
            "Broker query manager initialized"
        );
        Ok(manager)
    }
}

pub struct BrokerQueryManager {
    name: String,
    profile: Arc<dyn BrokerProfile>,
    registry: Arc<TargetRegistry>,
    parameters: QueryParameters,
    broker_directory: PathBuf,
    listener: AlertListener,
    processor: AlertProcessor,
    bootstrapper: TargetBootstrapper,
    scheduler: LightcurveScheduler,
    fetcher: BatchFetcher,
    cache: Arc<LightcurveCache>,
    propagator: UpdatePropagator,
}

impl std::fmt::Debug for BrokerQueryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerQueryManager")
            .field("name", &self.name)
            .field("label", &self.profile.label())
            .field("broker_directory", &self.broker_directory)
            .field("parameters", &self.parameters)
            .field("listener", &self.listener)
            .field("fetcher", &self.fetcher)
            .finish()
    }
}

impl BrokerQueryManager {
    pub fn builder<P>(
        profile: P,
        config: BrokerConfig,
        registry: Arc<TargetRegistry>,
        data_directory: impl Into<PathBuf>,
    ) -> BrokerQueryManagerBuilder
    where
        P: BrokerProfile + 'static,
    {
        BrokerQueryManagerBuilder {
            profile: Arc::new(profile),
            config,
            registry,
            data_directory: data_directory.into(),
            alert_source: None,
            lightcurve_source: None,
        }
    }

    pub fn registry(&self) -> &Arc<TargetRegistry> {
        &self.registry
    }

    pub fn cache(&self) -> &LightcurveCache {
        &self.cache
    }

    pub fn broker_directory(&self) -> &Path {
        &self.broker_directory
    }

    /// Merge a cached lightcurve onto a target. Returns true if it was accepted.
    fn install_lightcurve(&self, target: &mut TrackedObject, lightcurve: Lightcurve) -> bool {
        let existing = target.broker_data_mut(&self.name).lightcurve.take();
        if existing.as_ref() == Some(&lightcurve) {
            target.broker_data_mut(&self.name).lightcurve = existing;
            return false;
        }

        backfill_coordinates(target, &lightcurve);

        let decision = merge(existing, lightcurve, self.cache.empty_result_policy());
        target
            .broker_data_mut(&self.name)
            .add_lightcurve(decision.lightcurve);
        if decision.was_updated {
            target.updated = true;
        }
        decision.was_updated
    }
}

#[async_trait]
impl QueryManager for BrokerQueryManager {
    fn name(&self) -> &str {
        &self.name
    }

    async fn listen(&self) -> Vec<Alert> {
        self.listener.listen().await
    }

    async fn process_alerts(&self, alerts: Vec<Alert>, t_ref: DateTime<Utc>) -> Vec<Alert> {
        self.processor.process(alerts, t_ref).await
    }

    fn bootstrap_targets(&self, alerts: &[Alert], t_ref: DateTime<Utc>) -> BootstrapOutcome {
        self.bootstrapper.bootstrap(alerts, t_ref)
    }

    async fn alert_fetch_ids(&self, alerts: &[Alert], t_ref: DateTime<Utc>) -> Vec<String> {
        let mut seen = HashSet::new();
        let object_ids: Vec<String> = alerts
            .iter()
            .filter_map(Alert::object_id)
            .filter(|id| seen.insert(*id))
            .map(str::to_string)
            .collect();

        let interval = self.parameters.object_query_interval();
        if interval <= chrono::Duration::zero() {
            return object_ids;
        }

        // A new object has no cache yet and always needs its history
        LightcurveScheduler::new(MissingFilePolicy::Immediate)
            .filter_due(object_ids, &self.cache, interval, t_ref)
            .await
    }

    async fn schedule_fetch(&self, t_ref: DateTime<Utc>) -> Vec<String> {
        self.scheduler
            .due(
                &self.registry,
                &self.cache,
                self.parameters.lightcurve_update_interval(),
                t_ref,
            )
            .await
    }

    async fn fetch(&self, object_ids: &[String]) -> FetchOutcome {
        self.fetcher.fetch(object_ids).await
    }

    async fn load_cache(&self, object_ids: Option<&[String]>, t_ref: DateTime<Utc>) -> LoadOutcome {
        let requested = object_ids.is_some();
        let object_ids = match object_ids {
            Some(ids) => ids.to_vec(),
            None => self.registry.object_ids(),
        };

        let mut outcome = LoadOutcome::default();
        for object_id in object_ids {
            let Some(lightcurve) = self.cache.load(&object_id).await else {
                outcome.missing.push(object_id);
                continue;
            };

            if !self.registry.contains(&object_id) {
                if requested
                    && self
                        .bootstrapper
                        .bootstrap_from_lightcurve(&object_id, &lightcurve, t_ref)
                {
                    outcome.created.push(object_id.clone());
                } else {
                    warn!(broker = %self.name, object_id = %object_id, "Cached lightcurve has no tracked object");
                    outcome.missing.push(object_id);
                    continue;
                }
            }

            let accepted = self
                .registry
                .with_target_mut(&object_id, |target| self.install_lightcurve(target, lightcurve));
            match accepted {
                Some(true) => outcome.loaded.push(object_id),
                Some(false) => outcome.skipped.push(object_id),
                None => outcome.missing.push(object_id),
            }
        }

        debug!(
            broker = %self.name,
            loaded = outcome.loaded.len(),
            skipped = outcome.skipped.len(),
            missing = outcome.missing.len(),
            "Cached lightcurves loaded"
        );
        outcome
    }

    fn propagate(&self, alerts: &[Alert]) -> PropagationOutcome {
        self.propagator.propagate(alerts)
    }
}
