mod common;

use broker_query::messaging::ChannelAlertSource;
use broker_query::models::{Coordinates, TrackedObject};
use broker_query::query_managers::{BrokerQueryManager, QueryManager};
use broker_query::registry::TargetRegistry;
use chrono::Utc;
use common::*;
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

fn ids(range: std::ops::RangeInclusive<u32>) -> Vec<String> {
    range.map(|i| i.to_string()).collect()
}

fn failing_second_call(dir: &TempDir) -> (BrokerQueryManager, Arc<ScriptedLightcurveSource>) {
    let mut source = ScriptedLightcurveSource::failing_on([1]);
    for id in ids(1..=7) {
        source = source.with_lightcurve(&id, lightcurve_with_rows(2));
    }
    let source = Arc::new(source);
    let manager = lasair_manager(
        dir.path(),
        Arc::new(TargetRegistry::new()),
        source.clone(),
        None,
        |config| {
            config.bulk_query.chunk_size = 3;
            config.query_parameters.max_failed_queries = 1;
        },
    );
    (manager, source)
}

#[tokio::test]
async fn test_failed_chunk_opens_circuit() {
    let dir = TempDir::new().unwrap();
    let (manager, _) = failing_second_call(&dir);

    let outcome = manager.fetch(&ids(1..=5)).await;
    assert_eq!(outcome.succeeded, ids(1..=3));
    assert_eq!(outcome.failed, ids(4..=5));
    assert!(outcome.unattempted.is_empty());
    assert!(outcome.circuit_opened);
}

#[tokio::test]
async fn test_open_circuit_skips_remaining_chunks() {
    let dir = TempDir::new().unwrap();
    let (manager, source) = failing_second_call(&dir);

    let outcome = manager.fetch(&ids(1..=7)).await;
    assert_eq!(outcome.succeeded, ids(1..=3));
    assert_eq!(outcome.failed, ids(4..=6));
    assert_eq!(outcome.unattempted, vec!["7"]);
    assert_eq!(source.calls().len(), 2);
    assert!(!manager.cache().lightcurve_file("7").exists());
}

#[tokio::test]
async fn test_null_coordinates_backfilled_from_lightcurve() {
    let dir = TempDir::new().unwrap();
    let registry = Arc::new(TargetRegistry::new());
    registry.insert(TrackedObject::new("ZTF23aaaa", None, Utc::now()));

    let source = Arc::new(
        ScriptedLightcurveSource::new().with_lightcurve("ZTF23aaaa", positioned_lightcurve(10.0, 20.0)),
    );
    let manager = lasair_manager(dir.path(), registry.clone(), source, None, |_| {});

    let fetched = manager.fetch(&["ZTF23aaaa".to_string()]).await;
    assert_eq!(fetched.succeeded, vec!["ZTF23aaaa"]);
    let loaded = manager.load_cache(None, Utc::now()).await;
    assert_eq!(loaded.loaded, vec!["ZTF23aaaa"]);

    let target = registry.get("ZTF23aaaa").unwrap();
    let coordinates = target.coordinates.unwrap();
    assert!((coordinates.ra - 10.0).abs() < 1e-9);
    assert!((coordinates.dec - 20.0).abs() < 1e-9);
    assert!(target.updated);
}

#[tokio::test]
async fn test_shorter_fetch_does_not_regress_cache() {
    let dir = TempDir::new().unwrap();
    let registry = Arc::new(TargetRegistry::new());
    registry.insert(TrackedObject::new("ZTF23bbbb", Coordinates::try_new(1.0, 1.0), Utc::now()));

    let source = Arc::new(
        ScriptedLightcurveSource::new().with_lightcurve("ZTF23bbbb", lightcurve_with_rows(50)),
    );
    let manager = lasair_manager(dir.path(), registry.clone(), source.clone(), None, |_| {});

    manager.fetch(&["ZTF23bbbb".to_string()]).await;
    manager.load_cache(None, Utc::now()).await;
    registry.with_target_mut("ZTF23bbbb", |target| target.updated = false);

    source.set_lightcurve("ZTF23bbbb", lightcurve_with_rows(48));
    let fetched = manager.fetch(&["ZTF23bbbb".to_string()]).await;
    assert_eq!(fetched.succeeded, vec!["ZTF23bbbb"]);
    assert_eq!(manager.cache().load("ZTF23bbbb").await.unwrap().len(), 50);

    let loaded = manager.load_cache(None, Utc::now()).await;
    assert_eq!(loaded.skipped, vec!["ZTF23bbbb"]);
    let target = registry.get("ZTF23bbbb").unwrap();
    assert!(!target.updated);
    assert_eq!(
        target.broker_data("lasair").unwrap().lightcurve.as_ref().unwrap().len(),
        50
    );
}

#[tokio::test]
async fn test_first_empty_result_counts_as_update() {
    let dir = TempDir::new().unwrap();
    let registry = Arc::new(TargetRegistry::new());
    registry.insert(TrackedObject::new("ZTF23cccc", None, Utc::now()));

    let source = Arc::new(
        ScriptedLightcurveSource::new().with_lightcurve("ZTF23cccc", lightcurve_with_rows(0)),
    );
    let manager = lasair_manager(dir.path(), registry.clone(), source, None, |_| {});

    manager.fetch(&["ZTF23cccc".to_string()]).await;
    assert_eq!(manager.cache().load("ZTF23cccc").await.map(|lc| lc.len()), Some(0));

    let loaded = manager.load_cache(None, Utc::now()).await;
    assert_eq!(loaded.loaded, vec!["ZTF23cccc"]);
    let target = registry.get("ZTF23cccc").unwrap();
    assert!(target.updated);
    assert!(target.coordinates.is_none());
}

#[tokio::test]
async fn test_ignore_policy_keeps_cache_on_empty_refetch() {
    let dir = TempDir::new().unwrap();
    let source = Arc::new(
        ScriptedLightcurveSource::new().with_lightcurve("ZTF23dddd", lightcurve_with_rows(0)),
    );
    let manager = lasair_manager(
        dir.path(),
        Arc::new(TargetRegistry::new()),
        source.clone(),
        None,
        |config| {
            config.cache.empty_result_policy = broker_query::config::EmptyResultPolicy::Ignore;
        },
    );

    // The first result is accepted even when empty
    manager.fetch(&["ZTF23dddd".to_string()]).await;
    let path = manager.cache().lightcurve_file("ZTF23dddd");
    let first_written = std::fs::metadata(&path).unwrap().modified().unwrap();

    manager.fetch(&["ZTF23dddd".to_string()]).await;
    assert_eq!(std::fs::metadata(&path).unwrap().modified().unwrap(), first_written);
}

#[tokio::test]
async fn test_full_cycle_from_alert() {
    let dir = TempDir::new().unwrap();
    let registry = Arc::new(TargetRegistry::new());
    let bus = ChannelAlertSource::new();
    let source = Arc::new(
        ScriptedLightcurveSource::new().with_lightcurve("ZTF23eeee", lightcurve_with_rows(5)),
    );
    let manager = lasair_manager(
        dir.path(),
        registry.clone(),
        source.clone(),
        Some(Arc::new(bus.clone())),
        |config| config.kafka = Some(kafka_config(&["lasair_sn"], 10)),
    );

    bus.publish_json(
        "lasair_sn",
        &json!({"objectId": "ZTF23eeee", "candid": 77, "ramean": 150.0, "decmean": 2.5, "mjdmax": 60000.5}),
    );
    let report = manager.run_cycle(Utc::now()).await;

    assert_eq!(report.alerts, 1);
    assert_eq!(report.bootstrap.added, vec!["ZTF23eeee"]);
    assert_eq!(report.alert_fetch.succeeded, vec!["ZTF23eeee"]);
    // Fetched by the alert stage, so not stale for the scheduled pass
    assert_eq!(report.scheduled_fetch.total(), 0);
    assert_eq!(report.load.loaded, vec!["ZTF23eeee"]);
    assert_eq!(report.propagation.notified, vec!["ZTF23eeee"]);
    assert_eq!(source.requested_ids(), vec!["ZTF23eeee"]);

    let target = registry.get("ZTF23eeee").unwrap();
    assert_eq!(target.ra(), Some(150.0));
    assert!(target.updated);
    assert!(target.send_updates);
    assert_eq!(
        target.update_messages,
        vec!["LASAIR alert from lasair_sn\n     broadcast at jd=2023-02-25T12:00:00.000\n"]
    );
    assert_eq!(
        target.broker_data("lasair").unwrap().lightcurve.as_ref().map(|lc| lc.len()),
        Some(5)
    );
    assert!(dir.path().join("lasair/alerts/ZTF23eeee_77.json").exists());
    assert!(dir.path().join("lasair/lightcurves/ZTF23eeee.csv").exists());
}

#[tokio::test]
async fn test_repeated_alert_persists_one_file() {
    let dir = TempDir::new().unwrap();
    let registry = Arc::new(TargetRegistry::new());
    let bus = ChannelAlertSource::new();
    let manager = lasair_manager(
        dir.path(),
        registry.clone(),
        Arc::new(ScriptedLightcurveSource::new()),
        Some(Arc::new(bus.clone())),
        |config| config.kafka = Some(kafka_config(&["lasair_sn"], 10)),
    );

    let payload = json!({"objectId": "ZTF23ffff", "candid": 9, "UTC": "2024-03-01 10:00:00"});
    bus.publish_json("lasair_sn", &payload);
    bus.publish_json("lasair_sn", &payload);
    let report = manager.run_cycle(Utc::now()).await;
    assert_eq!(report.alerts, 2);

    let files: Vec<_> = std::fs::read_dir(dir.path().join("lasair/alerts"))
        .unwrap()
        .map(|entry| entry.unwrap().file_name())
        .collect();
    assert_eq!(files, vec![std::ffi::OsString::from("ZTF23ffff_9.json")]);

    // Both alerts still notify the target
    let target = registry.get("ZTF23ffff").unwrap();
    assert_eq!(target.update_messages.len(), 2);
    assert!(target.coordinates.is_none());
}

#[tokio::test]
async fn test_managers_share_one_registry() {
    let dir = TempDir::new().unwrap();
    let registry = Arc::new(TargetRegistry::new());
    let bus = ChannelAlertSource::new();
    let manager = Arc::new(lasair_manager(
        dir.path(),
        registry.clone(),
        Arc::new(ScriptedLightcurveSource::new()),
        Some(Arc::new(bus.clone())),
        |config| config.kafka = Some(kafka_config(&["lasair_sn"], 50)),
    ));

    for i in 0..20 {
        bus.publish_json("lasair_sn", &json!({"objectId": format!("ZTF{}", i % 4), "candid": i}));
    }

    let first = manager.clone();
    let second = manager.clone();
    let (a, b) = tokio::join!(
        async move { first.run_cycle(Utc::now()).await },
        async move { second.run_cycle(Utc::now()).await }
    );
    assert_eq!(a.alerts + b.alerts, 20);
    assert_eq!(registry.len(), 4);

    let messages: usize = registry
        .object_ids()
        .iter()
        .map(|id| registry.with_target(id, |t| t.update_messages.len()).unwrap())
        .sum();
    assert_eq!(messages, 20);
}

#[tokio::test]
async fn test_unknown_objects_do_not_starve_scheduled_fetches() {
    let dir = TempDir::new().unwrap();
    let registry = Arc::new(TargetRegistry::new());
    for id in ["a", "b", "c", "d", "e", "f"] {
        registry.insert(TrackedObject::new(id, None, Utc::now()));
    }
    // "a" and "b" belong to another broker; this one has no data for them
    let mut source = ScriptedLightcurveSource::new();
    for id in ["c", "d", "e", "f"] {
        source = source.with_lightcurve(id, lightcurve_with_rows(3));
    }
    let source = Arc::new(source);
    let manager = lasair_manager(dir.path(), registry, source.clone(), None, |config| {
        config.bulk_query.chunk_size = 3;
        config.query_parameters.max_failed_queries = 1;
    });

    let report = manager.run_cycle(Utc::now()).await;
    assert_eq!(report.scheduled_fetch.succeeded, vec!["c", "d", "e", "f"]);
    assert_eq!(report.scheduled_fetch.failed, vec!["a", "b"]);
    assert!(report.scheduled_fetch.unattempted.is_empty());
    assert!(!report.scheduled_fetch.circuit_opened);
    assert_eq!(source.calls().len(), 2);
}

#[tokio::test]
async fn test_zero_update_interval_does_not_refetch_within_cycle() {
    let dir = TempDir::new().unwrap();
    let registry = Arc::new(TargetRegistry::new());
    let bus = ChannelAlertSource::new();
    let source = Arc::new(
        ScriptedLightcurveSource::new().with_lightcurve("ZTF23gggg", lightcurve_with_rows(4)),
    );
    let manager = lasair_manager(
        dir.path(),
        registry,
        source.clone(),
        Some(Arc::new(bus.clone())),
        |config| {
            config.kafka = Some(kafka_config(&["lasair_sn"], 10));
            config.query_parameters.lightcurve_update_interval = 0.0;
        },
    );

    bus.publish_json("lasair_sn", &json!({"objectId": "ZTF23gggg", "candid": 3}));
    let report = manager.run_cycle(Utc::now()).await;
    assert_eq!(report.alert_fetch.succeeded, vec!["ZTF23gggg"]);
    assert_eq!(report.scheduled_fetch.total(), 0);
    assert_eq!(source.calls().len(), 1);

    // A later cycle sees the file as aged and refreshes it
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    let report = manager.run_cycle(Utc::now()).await;
    assert_eq!(report.scheduled_fetch.succeeded, vec!["ZTF23gggg"]);
}
