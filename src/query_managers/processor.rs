//! # Alert Processor
//!
//! Stamps each alert with a normalized `alert_timestamp` and keeps a copy on
//! disk, one file per `(objectId, candidate)`. Re-processing the same alert
//! rewrites the same file.

use crate::error::Result;
use crate::models::Alert;
use crate::utils::fs::{safe_file_stem, write_atomic};
use crate::utils::serde::value_as_f64;
use crate::utils::time::{format_isot, jd_to_datetime, mjd_to_datetime, parse_timestamp};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Where an alert's timestamp came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampSource {
    Timestamp,
    Utc,
    Mjdmax,
    Jdmax,
    Reference,
}

impl fmt::Display for TimestampSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TimestampSource::Timestamp => "timestamp",
            TimestampSource::Utc => "UTC",
            TimestampSource::Mjdmax => "mjdmax",
            TimestampSource::Jdmax => "jdmax",
            TimestampSource::Reference => "t_ref",
        };
        f.write_str(name)
    }
}

fn parse_text_field(value: &Value) -> Option<DateTime<Utc>> {
    value.as_str().and_then(parse_timestamp)
}

/// Resolve an alert's timestamp: `timestamp`, `UTC`, `mjdmax`, `jdmax`,
/// falling back to `t_ref`.
///
/// A field that is present but unparseable is skipped in favour of the next one.
pub fn resolve_alert_timestamp(alert: &Alert, t_ref: DateTime<Utc>) -> (DateTime<Utc>, TimestampSource) {
    let candidates: [(&str, TimestampSource, fn(&Value) -> Option<DateTime<Utc>>); 4] = [
        ("timestamp", TimestampSource::Timestamp, parse_text_field),
        ("UTC", TimestampSource::Utc, parse_text_field),
        ("mjdmax", TimestampSource::Mjdmax, |v| value_as_f64(v).and_then(mjd_to_datetime)),
        ("jdmax", TimestampSource::Jdmax, |v| value_as_f64(v).and_then(jd_to_datetime)),
    ];

    for (field, source, parse) in candidates {
        let Some(value) = alert.get(field) else {
            continue;
        };
        match parse(value) {
            Some(timestamp) => return (timestamp, source),
            None => debug!(
                object_id = alert.object_id(),
                field = field,
                value = %value,
                "Unparseable alert timestamp field"
            ),
        }
    }
    (t_ref, TimestampSource::Reference)
}

#[derive(Debug, Clone)]
pub struct AlertProcessor {
    broker: String,
    /// `None` disables alert persistence
    alerts_directory: Option<PathBuf>,
}

impl AlertProcessor {
    pub fn new(broker: impl Into<String>, alerts_directory: Option<PathBuf>) -> Self {
        Self {
            broker: broker.into(),
            alerts_directory,
        }
    }

    /// File an alert is persisted to. Alerts without a candidate id are keyed
    /// by their resolved timestamp instead.
    pub fn alert_file(&self, alert: &Alert) -> Option<PathBuf> {
        let directory = self.alerts_directory.as_ref()?;
        let object_id = alert.object_id()?;
        let discriminator = match alert.candidate_id() {
            Some(candidate) => candidate,
            None => {
                let timestamp = alert
                    .alert_timestamp()
                    .and_then(parse_timestamp)
                    .map(|ts| ts.format("%Y%m%dT%H%M%S%.3f").to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                format!("t{timestamp}")
            }
        };
        Some(directory.join(format!(
            "{}_{}.json",
            safe_file_stem(object_id),
            safe_file_stem(&discriminator)
        )))
    }

    /// Stamp and persist every alert, returning them in input order
    pub async fn process(&self, alerts: Vec<Alert>, t_ref: DateTime<Utc>) -> Vec<Alert> {
        let mut processed = Vec::with_capacity(alerts.len());
        for mut alert in alerts {
            let (timestamp, source) = resolve_alert_timestamp(&alert, t_ref);
            if source == TimestampSource::Reference {
                warn!(
                    broker = %self.broker,
                    object_id = alert.object_id(),
                    t_ref = %format_isot(&t_ref),
                    "Alert has no usable timestamp; using reference time"
                );
            }
            alert.set_alert_timestamp(format_isot(&timestamp));

            if let Err(e) = self.persist(&alert).await {
                warn!(
                    broker = %self.broker,
                    object_id = alert.object_id(),
                    error = %e,
                    "Failed to save alert"
                );
            }
            processed.push(alert);
        }
        processed
    }

    async fn persist(&self, alert: &Alert) -> Result<()> {
        if self.alerts_directory.is_none() {
            return Ok(());
        }
        let Some(path) = self.alert_file(alert) else {
            warn!(broker = %self.broker, "Alert without objectId not saved");
            return Ok(());
        };
        let contents = serde_json::to_vec_pretty(alert)?;
        write_atomic(&path, &contents).await
    }
}
