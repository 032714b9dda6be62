//! Configuration Loader
//!
//! Layered configuration loading: serde defaults, then a TOML file, then
//! environment overrides of the form `BROKER_QUERY__LASAIR__CLIENT_TOKEN`.
//! The merged result is validated before it is handed out.

use super::error::{ConfigResult, ConfigurationError};
use super::BrokerQueryConfig;
use ::config::{Config, Environment, File, FileFormat};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "BROKER_QUERY";

/// Loaded, validated configuration plus where it came from
#[derive(Debug)]
pub struct ConfigManager {
    config: BrokerQueryConfig,
    source: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration from a TOML file with environment overrides
    pub fn load_from_file(path: impl AsRef<Path>) -> ConfigResult<Arc<ConfigManager>> {
        Self::load_with_env_prefix(path, ENV_PREFIX)
    }

    /// Load configuration from a TOML file, reading overrides under a custom prefix
    pub fn load_with_env_prefix(
        path: impl AsRef<Path>,
        env_prefix: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ConfigurationError::config_file_not_found(path));
        }

        debug!(path = %path.display(), env_prefix = env_prefix, "Loading configuration");

        let config = Config::builder()
            .add_source(File::from(path).format(FileFormat::Toml).required(true))
            .add_source(
                Environment::with_prefix(env_prefix)
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("lasair.kafka.topics"),
            )
            .build()
            .map_err(|e| ConfigurationError::load_error(path.display().to_string(), e))?;

        Self::finish(config, Some(path.to_path_buf()))
    }

    /// Load configuration from an in-memory TOML document (no environment layer)
    pub fn load_from_str(toml: &str) -> ConfigResult<Arc<ConfigManager>> {
        let config = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .map_err(|e| ConfigurationError::load_error("inline", e))?;

        Self::finish(config, None)
    }

    /// Wrap an already-built configuration after validating it
    pub fn from_config(config: BrokerQueryConfig) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            source: None,
        }))
    }

    fn finish(config: Config, source: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let source_name = source
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "inline".to_string());

        let config: BrokerQueryConfig = config
            .try_deserialize()
            .map_err(|e| ConfigurationError::load_error(source_name.clone(), e))?;

        config.validate()?;

        debug!(
            "Configuration loaded successfully: {}",
            serde_json::to_string(&Self::sanitize_config_for_logging(&config))
                .unwrap_or_else(|_| "[serialization error]".to_string())
        );
        info!(
            source = %source_name,
            data_directory = %config.data_directory.display(),
            lasair_enabled = config.lasair.is_some(),
            "Configuration loaded"
        );

        Ok(Arc::new(ConfigManager { config, source }))
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &BrokerQueryConfig {
        &self.config
    }

    /// File the configuration was read from, if any
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Configuration as JSON with credentials masked
    pub fn debug_config(&self) -> serde_json::Value {
        Self::sanitize_config_for_logging(&self.config)
    }

    fn sanitize_config_for_logging(config: &BrokerQueryConfig) -> serde_json::Value {
        let mut config_json = serde_json::json!(config);
        let sensitive_patterns = ["password", "secret", "key", "token", "credential", "auth"];
        Self::sanitize_json_recursive(&mut config_json, &sensitive_patterns);
        config_json
    }

    fn sanitize_json_recursive(value: &mut serde_json::Value, sensitive_patterns: &[&str]) {
        match value {
            serde_json::Value::Object(map) => {
                for (key, val) in map.iter_mut() {
                    let key_lower = key.to_lowercase();
                    let is_sensitive = sensitive_patterns
                        .iter()
                        .any(|pattern| key_lower.contains(pattern));

                    if is_sensitive {
                        *val = match val {
                            serde_json::Value::Null => serde_json::Value::Null,
                            serde_json::Value::String(s) if s.is_empty() => {
                                serde_json::Value::String("[EMPTY]".to_string())
                            }
                            serde_json::Value::String(s) if s.len() > 4 => serde_json::Value::String(
                                format!("[MASKED: {}***{}]", &s[..2], &s[s.len() - 2..]),
                            ),
                            _ => serde_json::Value::String("[MASKED]".to_string()),
                        };
                    } else {
                        Self::sanitize_json_recursive(val, sensitive_patterns);
                    }
                }
            }
            serde_json::Value::Array(items) => {
                for item in items {
                    Self::sanitize_json_recursive(item, sensitive_patterns);
                }
            }
            _ => {}
        }
    }
}
