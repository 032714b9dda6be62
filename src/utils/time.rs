//! Astronomical time helpers.
//!
//! Alerts carry timestamps as ISO strings, Modified Julian Dates or Julian
//! Dates; lightcurve rows are ordered by MJD. Everything is normalized to
//! `DateTime<Utc>` at the edges.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// MJD of the Unix epoch (1970-01-01T00:00:00Z)
pub const MJD_UNIX_EPOCH: f64 = 40_587.0;

/// JD − MJD
pub const JD_MJD_OFFSET: f64 = 2_400_000.5;

const SECONDS_PER_DAY: f64 = 86_400.0;

pub fn jd_to_mjd(jd: f64) -> f64 {
    jd - JD_MJD_OFFSET
}

/// Convert a Modified Julian Date to UTC (millisecond precision)
pub fn mjd_to_datetime(mjd: f64) -> Option<DateTime<Utc>> {
    if !mjd.is_finite() {
        return None;
    }
    let millis = ((mjd - MJD_UNIX_EPOCH) * SECONDS_PER_DAY * 1000.0).round();
    if millis.abs() > i64::MAX as f64 {
        return None;
    }
    DateTime::from_timestamp_millis(millis as i64)
}

/// Convert a Julian Date to UTC
pub fn jd_to_datetime(jd: f64) -> Option<DateTime<Utc>> {
    mjd_to_datetime(jd_to_mjd(jd))
}

/// Parse the timestamp strings brokers emit.
///
/// Accepts RFC 3339 and the zone-less ISO forms (`T` or space separated,
/// optional fractional seconds, or a bare date), which are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// ISO-8601 with millisecond precision and no zone suffix, e.g. `2023-06-04T05:43:12.000`
pub fn format_isot(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%dT%H:%M:%S%.3f").to_string()
}
