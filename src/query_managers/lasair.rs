//! # Lasair
//!
//! The Lasair variant: its profile, the REST client for bulk lightcurves and
//! the conversion from Lasair candidate lists to lightcurve rows.
//!
//! A Lasair lightcurve item looks like
//!
//! ```json
//! {"objectId": "ZTF23abcdefg", "candidates": [{"candid": 2345, "jd": 2460000.5, "fid": 1, "magpsf": 18.2, ...}]}
//! ```
//!
//! Candidates with a `candid` are detections; candidates without one are
//! non-detection upper limits.

use crate::config::{BrokerConfig, ConfigurationError};
use crate::error::{BrokerError, Result};
use crate::models::lightcurve::FIXED_COLUMNS;
use crate::models::{DetectionTag, Lightcurve, LightcurveRow};
use crate::query_managers::bootstrap::DEFAULT_COORDINATE_GUESSES;
use crate::query_managers::fetcher::{FetchedLightcurve, LightcurveSource};
use crate::query_managers::manager::BrokerProfile;
use crate::utils::serde::{value_as_f64, value_as_i64};
use crate::utils::time::jd_to_mjd;
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const LASAIR: &str = "lasair";

/// Lasair's broker profile
#[derive(Debug, Clone, Copy, Default)]
pub struct LasairProfile;

impl BrokerProfile for LasairProfile {
    fn name(&self) -> &str {
        LASAIR
    }

    fn label(&self) -> &str {
        "LASAIR"
    }

    fn coordinate_guesses(&self) -> Vec<(String, String)> {
        DEFAULT_COORDINATE_GUESSES
            .iter()
            .map(|(ra, dec)| (ra.to_string(), dec.to_string()))
            .collect()
    }

    fn lightcurve_source(&self, config: &BrokerConfig) -> Result<Arc<dyn LightcurveSource>> {
        let token = config
            .client_token
            .as_deref()
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| ConfigurationError::missing_required_field("client_token", LASAIR))?;
        let client = LasairHttpClient::new(
            &config.bulk_query.base_url,
            token,
            config.bulk_query.request_timeout(),
        )?;
        Ok(Arc::new(client))
    }
}

/// ZTF filter id to band name
pub fn band_from_fid(fid: Option<i64>) -> String {
    match fid {
        Some(1) => "ztfg".to_string(),
        Some(2) => "ztfr".to_string(),
        Some(3) => "ztfi".to_string(),
        Some(other) => format!("fid{other}"),
        None => String::new(),
    }
}

fn field_f64(candidate: &Map<String, Value>, field: &str) -> Option<f64> {
    candidate.get(field).and_then(value_as_f64)
}

/// Convert one candidate; `None` if it has no usable `jd`
fn row_from_candidate(candidate: &Map<String, Value>) -> Option<LightcurveRow> {
    let jd = field_f64(candidate, "jd")?;
    let fid = candidate.get("fid").and_then(value_as_i64);
    let mut row = LightcurveRow::new(jd_to_mjd(jd), band_from_fid(fid));

    match candidate.get("candid").and_then(value_as_i64).filter(|id| *id != 0) {
        Some(candid) => {
            row.tag = Some(DetectionTag::Valid);
            row.candidate_id = Some(candid);
            row.mag = field_f64(candidate, "magpsf");
            row.magerr = field_f64(candidate, "sigmapsf");
        }
        None => {
            row.tag = Some(DetectionTag::Upperlim);
            row.mag = field_f64(candidate, "diffmaglim");
        }
    }
    row.ra = field_f64(candidate, "ra");
    row.dec = field_f64(candidate, "dec");

    row.extra = candidate
        .iter()
        .filter(|(key, value)| !value.is_null() && !FIXED_COLUMNS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    Some(row)
}

/// Convert a Lasair lightcurve item into rows sorted by time.
///
/// Candidates without a `jd` are dropped; repeated candidate ids keep their
/// first occurrence.
pub fn parse_lightcurve_item(item: &Value) -> Result<FetchedLightcurve> {
    let object_id = item
        .get("objectId")
        .and_then(Value::as_str)
        .ok_or_else(|| BrokerError::data_integrity("<unknown>", "lightcurve item has no objectId"))?
        .to_string();

    let candidates = match item.get("candidates") {
        None | Some(Value::Null) => &[][..],
        Some(Value::Array(candidates)) => candidates.as_slice(),
        Some(_) => {
            return Err(BrokerError::data_integrity(
                object_id,
                "'candidates' is not a list",
            ))
        }
    };

    let mut dropped = 0usize;
    let rows: Vec<LightcurveRow> = candidates
        .iter()
        .filter_map(|candidate| {
            let row = candidate.as_object().and_then(row_from_candidate);
            if row.is_none() {
                dropped += 1;
            }
            row
        })
        .collect();
    if dropped > 0 {
        debug!(object_id = %object_id, dropped = dropped, "Candidates without jd dropped");
    }

    let mut lightcurve = Lightcurve::new(rows);
    let duplicates = lightcurve.dedup_candidates();
    if duplicates > 0 {
        warn!(object_id = %object_id, duplicates = duplicates, "Duplicate candidates removed");
    }
    Ok(FetchedLightcurve {
        object_id,
        lightcurve,
    })
}

/// Lasair REST client for `lightcurves/`
#[derive(Debug, Clone)]
pub struct LasairHttpClient {
    http_client: reqwest::Client,
    endpoint: String,
    token: String,
}

impl LasairHttpClient {
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("broker-query/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BrokerError::http(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http_client,
            endpoint: format!("{}/lightcurves/", base_url.trim_end_matches('/')),
            token: token.to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl LightcurveSource for LasairHttpClient {
    async fn fetch_lightcurves(&self, object_ids: &[String]) -> Result<Vec<FetchedLightcurve>> {
        debug!(endpoint = %self.endpoint, count = object_ids.len(), "Querying Lasair lightcurves");

        let response = self
            .http_client
            .post(&self.endpoint)
            .header(AUTHORIZATION, format!("Token {}", self.token))
            .form(&[("objectIds", object_ids.join(",")), ("format", "json".to_string())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(BrokerError::transient_fetch(
                "lasair lightcurves",
                format!("HTTP {status}: {snippet}"),
            ));
        }

        let items: Vec<Value> = response.json().await?;
        Ok(items
            .iter()
            .filter_map(|item| match parse_lightcurve_item(item) {
                Ok(fetched) => Some(fetched),
                Err(e) => {
                    warn!(error = %e, "Skipping unusable Lasair lightcurve item");
                    None
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_lightcurve_item() {
        let item = json!({
            "objectId": "ZTF23abc",
            "candidates": [
                {"candid": 202, "jd": 2460001.5, "fid": 2, "magpsf": 18.5, "sigmapsf": 0.1,
                 "ra": 150.0, "dec": -30.0, "isdiffpos": "t"},
                {"jd": 2460000.5, "fid": 1, "diffmaglim": 20.1},
                {"candid": 201, "jd": 2460000.7, "fid": 1, "magpsf": 18.9, "sigmapsf": 0.2},
                {"candid": 202, "jd": 2460001.5, "fid": 2, "magpsf": 18.6},
                {"candid": 300, "fid": 1}
            ]
        });

        let fetched = parse_lightcurve_item(&item).unwrap();
        assert_eq!(fetched.object_id, "ZTF23abc");

        let rows = fetched.lightcurve.rows();
        assert_eq!(rows.len(), 3);

        assert_eq!(rows[0].time, 60000.0);
        assert_eq!(rows[0].tag, Some(DetectionTag::Upperlim));
        assert_eq!(rows[0].mag, Some(20.1));
        assert_eq!(rows[0].candidate_id, None);
        assert_eq!(rows[0].band, "ztfg");

        assert_eq!(rows[1].candidate_id, Some(201));
        assert_eq!(rows[2].candidate_id, Some(202));
        assert_eq!(rows[2].tag, Some(DetectionTag::Valid));
        assert_eq!(rows[2].mag, Some(18.5));
        assert_eq!(rows[2].magerr, Some(0.1));
        assert_eq!(rows[2].band, "ztfr");
        assert_eq!(rows[2].ra, Some(150.0));
        assert_eq!(rows[2].extra.get("isdiffpos"), Some(&json!("t")));
    }

    #[test]
    fn test_item_without_object_id_is_rejected() {
        let result = parse_lightcurve_item(&json!({"candidates": []}));
        assert!(matches!(result, Err(BrokerError::DataIntegrity { .. })));
    }

    #[test]
    fn test_item_without_candidates_is_empty() {
        let fetched = parse_lightcurve_item(&json!({"objectId": "ZTF1"})).unwrap();
        assert!(fetched.lightcurve.is_empty());
    }

    #[test]
    fn test_band_from_fid() {
        assert_eq!(band_from_fid(Some(3)), "ztfi");
        assert_eq!(band_from_fid(Some(7)), "fid7");
        assert_eq!(band_from_fid(None), "");
    }

    #[test]
    fn test_profile_requires_token() {
        let mut config = BrokerConfig::with_token("  ");
        assert!(matches!(
            LasairProfile.lightcurve_source(&config),
            Err(BrokerError::Configuration(_))
        ));

        config.client_token = Some("secret".to_string());
        assert!(LasairProfile.lightcurve_source(&config).is_ok());
    }

    #[test]
    fn test_endpoint_normalization() {
        let client = LasairHttpClient::new("https://example.org/api/", "t", Duration::from_secs(5)).unwrap();
        assert_eq!(client.endpoint(), "https://example.org/api/lightcurves/");
    }
}
