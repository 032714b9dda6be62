use broker_query::config::{ConfigManager, EmptyResultPolicy, MissingFilePolicy};
use broker_query::orchestration::QueryOrchestrator;
use broker_query::registry::TargetRegistry;
use std::path::PathBuf;
use std::sync::Arc;

fn shipped_config() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config/broker-query.toml")
}

#[test]
fn test_shipped_config_loads() {
    let manager = ConfigManager::load_with_env_prefix(shipped_config(), "BROKER_QUERY_SHIPPED_TEST")
        .expect("shipped config must load");
    let config = manager.config();

    assert_eq!(config.cycle_interval_seconds, 300);
    let lasair = config.lasair.as_ref().expect("lasair section present");
    assert_eq!(lasair.query_parameters.max_failed_queries, 10);
    assert_eq!(lasair.bulk_query.chunk_size, 25);
    assert_eq!(lasair.cache.missing_file_policy, MissingFilePolicy::Immediate);
    assert_eq!(lasair.cache.empty_result_policy, EmptyResultPolicy::Accept);
    assert!(lasair.kafka.is_none());
}

#[test]
fn test_shipped_config_needs_token_to_build() {
    let manager = ConfigManager::load_with_env_prefix(shipped_config(), "BROKER_QUERY_SHIPPED_TEST")
        .expect("shipped config must load");

    let result = QueryOrchestrator::from_config(manager.config(), Arc::new(TargetRegistry::new()), None);
    assert!(result.is_err());
}
