//! # Broker Query Configuration
//!
//! Typed configuration for the broker query managers. Values come from
//! layered sources (defaults, a TOML file, environment overrides) assembled
//! by [`ConfigManager`], and are validated before any manager is built.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use broker_query::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load_from_file("config/broker-query.toml")?;
//! if let Some(lasair) = &manager.config().lasair {
//!     println!("chunk size: {}", lasair.bulk_query.chunk_size);
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Accept `topics` either as a single string or as a list of strings
fn deserialize_topics<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(topic) => Ok(vec![topic]),
        OneOrMany::Many(topics) => Ok(topics),
    }
}

/// Root configuration structure mirroring broker-query.toml
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BrokerQueryConfig {
    /// Root directory under which each broker keeps its alerts and lightcurves
    #[serde(default = "default_data_directory")]
    pub data_directory: PathBuf,

    /// Seconds between orchestrator cycles when run by the binary
    #[serde(default = "default_cycle_interval_seconds")]
    pub cycle_interval_seconds: u64,

    /// Lasair broker settings; absent means the broker is not used
    #[serde(default)]
    pub lasair: Option<BrokerConfig>,
}

fn default_data_directory() -> PathBuf {
    PathBuf::from("data")
}

fn default_cycle_interval_seconds() -> u64 {
    300
}

impl Default for BrokerQueryConfig {
    fn default() -> Self {
        Self {
            data_directory: default_data_directory(),
            cycle_interval_seconds: default_cycle_interval_seconds(),
            lasair: None,
        }
    }
}

impl BrokerQueryConfig {
    /// Validate every configured broker section
    pub fn validate(&self) -> ConfigResult<()> {
        if self.cycle_interval_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "cycle_interval_seconds",
                "0",
                "cycle interval must be greater than 0",
            ));
        }
        if let Some(lasair) = &self.lasair {
            lasair.validate("lasair")?;
        }
        Ok(())
    }
}

/// Settings for one broker query manager
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BrokerConfig {
    /// Access token for the bulk lightcurve API
    #[serde(default)]
    pub client_token: Option<String>,

    #[serde(default)]
    pub query_parameters: QueryParameters,

    /// Pub/sub connection; absent means no alerts are listened for
    #[serde(default)]
    pub kafka: Option<KafkaConfig>,

    #[serde(default)]
    pub bulk_query: BulkQueryConfig,

    #[serde(default)]
    pub cache: CacheConfig,
}

impl BrokerConfig {
    /// Build a config with defaults everywhere and no pub/sub connection
    pub fn with_token(client_token: impl Into<String>) -> Self {
        Self {
            client_token: Some(client_token.into()),
            query_parameters: QueryParameters::default(),
            kafka: None,
            bulk_query: BulkQueryConfig::default(),
            cache: CacheConfig::default(),
        }
    }

    pub fn validate(&self, broker: &str) -> ConfigResult<()> {
        self.query_parameters.validate(broker)?;
        self.bulk_query.validate(broker)?;
        if let Some(kafka) = &self.kafka {
            kafka.validate(broker)?;
        }
        Ok(())
    }
}

/// Staleness intervals and failure budget
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueryParameters {
    /// Days a cached lightcurve may age before an alert triggers a refresh
    #[serde(default = "default_object_query_interval")]
    pub object_query_interval: f64,

    /// Days a cached lightcurve may age before a scheduled refresh
    #[serde(default = "default_lightcurve_update_interval")]
    pub lightcurve_update_interval: f64,

    /// Failed ids tolerated per fetch call before remaining chunks are abandoned
    #[serde(default = "default_max_failed_queries")]
    pub max_failed_queries: u64,
}

fn default_object_query_interval() -> f64 {
    0.0
}

fn default_lightcurve_update_interval() -> f64 {
    2.0
}

fn default_max_failed_queries() -> u64 {
    10
}

impl Default for QueryParameters {
    fn default() -> Self {
        Self {
            object_query_interval: default_object_query_interval(),
            lightcurve_update_interval: default_lightcurve_update_interval(),
            max_failed_queries: default_max_failed_queries(),
        }
    }
}

impl QueryParameters {
    pub fn object_query_interval(&self) -> chrono::Duration {
        days_to_duration(self.object_query_interval)
    }

    pub fn lightcurve_update_interval(&self) -> chrono::Duration {
        days_to_duration(self.lightcurve_update_interval)
    }

    fn validate(&self, broker: &str) -> ConfigResult<()> {
        for (field, value) in [
            ("object_query_interval", self.object_query_interval),
            ("lightcurve_update_interval", self.lightcurve_update_interval),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigurationError::invalid_value(
                    format!("{broker}.query_parameters.{field}"),
                    value.to_string(),
                    "interval must be a non-negative number of days",
                ));
            }
        }
        Ok(())
    }
}

fn days_to_duration(days: f64) -> chrono::Duration {
    chrono::Duration::milliseconds((days * 86_400_000.0).round() as i64)
}

/// Pub/sub consumer settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KafkaConfig {
    #[serde(default)]
    pub host: String,

    #[serde(default)]
    pub group_id: String,

    #[serde(default, deserialize_with = "deserialize_topics")]
    pub topics: Vec<String>,

    /// Seconds a single poll may block
    #[serde(default = "default_poll_timeout_seconds")]
    pub poll_timeout_seconds: f64,

    /// Maximum polls per topic per cycle
    #[serde(default = "default_alerts_per_topic")]
    pub alerts_per_topic: usize,
}

fn default_poll_timeout_seconds() -> f64 {
    20.0
}

fn default_alerts_per_topic() -> usize {
    10
}

impl KafkaConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.poll_timeout_seconds.max(0.0))
    }

    fn validate(&self, broker: &str) -> ConfigResult<()> {
        let context = format!("{broker}.kafka");
        if self.host.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field("host", context));
        }
        if self.group_id.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field("group_id", context));
        }
        if self.topics.is_empty() {
            return Err(ConfigurationError::missing_required_field("topics", context));
        }
        if !self.poll_timeout_seconds.is_finite() || self.poll_timeout_seconds < 0.0 {
            return Err(ConfigurationError::invalid_value(
                format!("{context}.poll_timeout_seconds"),
                self.poll_timeout_seconds.to_string(),
                "poll timeout must be a non-negative number of seconds",
            ));
        }
        Ok(())
    }
}

/// Bulk lightcurve query settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BulkQueryConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Deadline for a single bulk request
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

fn default_base_url() -> String {
    "https://lasair-ztf.lsst.ac.uk/api".to_string()
}

fn default_chunk_size() -> usize {
    25
}

fn default_request_timeout_seconds() -> u64 {
    60
}

impl Default for BulkQueryConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            chunk_size: default_chunk_size(),
            request_timeout_seconds: default_request_timeout_seconds(),
        }
    }
}

impl BulkQueryConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    fn validate(&self, broker: &str) -> ConfigResult<()> {
        if self.chunk_size == 0 {
            return Err(ConfigurationError::invalid_value(
                format!("{broker}.bulk_query.chunk_size"),
                "0",
                "chunk size must be greater than 0",
            ));
        }
        if self.request_timeout_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                format!("{broker}.bulk_query.request_timeout_seconds"),
                "0",
                "request timeout must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// How a missing lightcurve file is scheduled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingFilePolicy {
    /// A missing file has infinite age and is due immediately
    #[default]
    Immediate,
    /// Objects without a cache file are left to alert-driven fetches
    Skip,
}

/// How an empty fetch result is merged over an existing cache
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyResultPolicy {
    /// Empty results follow the length rule (empty over empty is an update)
    #[default]
    Accept,
    /// Empty results never replace an existing cache
    Ignore,
}

/// Cache and alert persistence settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default = "default_save_alerts")]
    pub save_alerts: bool,

    #[serde(default)]
    pub missing_file_policy: MissingFilePolicy,

    #[serde(default)]
    pub empty_result_policy: EmptyResultPolicy,
}

fn default_save_alerts() -> bool {
    true
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            save_alerts: default_save_alerts(),
            missing_file_policy: MissingFilePolicy::default(),
            empty_result_policy: EmptyResultPolicy::default(),
        }
    }
}
