use broker_query::config::{BrokerConfig, KafkaConfig};
use broker_query::messaging::AlertSource;
use broker_query::models::{Alert, DetectionTag, Lightcurve, LightcurveRow};
use broker_query::query_managers::{BrokerQueryManager, LasairProfile, LightcurveSource};
use broker_query::registry::TargetRegistry;
use std::path::Path;
use std::sync::Arc;

/// `n` valid detections one day apart with distinct candidate ids
pub fn lightcurve_with_rows(n: usize) -> Lightcurve {
    Lightcurve::new(
        (0..n)
            .map(|i| {
                let mut row = LightcurveRow::new(60_000.0 + i as f64, if i % 2 == 0 { "ztfg" } else { "ztfr" });
                row.mag = Some(18.0 + i as f64 * 0.01);
                row.magerr = Some(0.05);
                row.tag = Some(DetectionTag::Valid);
                row.candidate_id = Some(1_000 + i as i64);
                row
            })
            .collect(),
    )
}

/// Detections whose positions are scattered symmetrically around `(ra, dec)`
pub fn positioned_lightcurve(ra: f64, dec: f64) -> Lightcurve {
    let offsets = [(-0.5, 0.25), (0.5, -0.25), (0.0, 0.0)];
    Lightcurve::new(
        offsets
            .iter()
            .enumerate()
            .map(|(i, (d_ra, d_dec))| {
                let mut row = LightcurveRow::new(60_000.0 + i as f64, "ztfg");
                row.tag = Some(DetectionTag::Valid);
                row.candidate_id = Some(i as i64 + 1);
                row.ra = Some(ra + d_ra);
                row.dec = Some(dec + d_dec);
                row
            })
            .collect(),
    )
}

pub fn alert(value: serde_json::Value) -> Alert {
    Alert::from_slice(value.to_string().as_bytes()).expect("test alert must be a JSON object")
}

pub fn kafka_config(topics: &[&str], alerts_per_topic: usize) -> KafkaConfig {
    KafkaConfig {
        host: "localhost:9092".to_string(),
        group_id: "broker-query-tests".to_string(),
        topics: topics.iter().map(|t| t.to_string()).collect(),
        poll_timeout_seconds: 0.01,
        alerts_per_topic,
    }
}

/// A Lasair manager writing under `data_directory`
pub fn lasair_manager(
    data_directory: &Path,
    registry: Arc<TargetRegistry>,
    source: Arc<dyn LightcurveSource>,
    alert_source: Option<Arc<dyn AlertSource>>,
    configure: impl FnOnce(&mut BrokerConfig),
) -> BrokerQueryManager {
    let mut config = BrokerConfig::with_token("test-token");
    configure(&mut config);

    let mut builder = BrokerQueryManager::builder(LasairProfile, config, registry, data_directory)
        .lightcurve_source(source);
    if let Some(alert_source) = alert_source {
        builder = builder.alert_source(alert_source);
    }
    builder.build().expect("test manager config must be valid")
}
