//! # Lightcurve
//!
//! Time-ordered photometry for one object from one broker. Rows are always
//! kept sorted ascending by acquisition time (MJD). The on-disk form is CSV
//! with the fixed columns from [`FIXED_COLUMNS`] followed by broker-native
//! pass-through columns in lexical order.

use crate::error::{BrokerError, Result};
use crate::utils::serde::{cell_to_value, value_to_cell};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

/// Columns every cache file starts with, in order
pub const FIXED_COLUMNS: [&str; 8] = [
    "time",
    "band",
    "mag",
    "magerr",
    "tag",
    "candidate_id",
    "ra",
    "dec",
];

/// Row classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionTag {
    /// Confident detection
    Valid,
    /// Non-detection upper limit
    Upperlim,
    /// Low-quality detection
    Badqual,
}

impl DetectionTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionTag::Valid => "valid",
            DetectionTag::Upperlim => "upperlim",
            DetectionTag::Badqual => "badqual",
        }
    }
}

impl fmt::Display for DetectionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DetectionTag {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "valid" => Ok(DetectionTag::Valid),
            "upperlim" => Ok(DetectionTag::Upperlim),
            "badqual" => Ok(DetectionTag::Badqual),
            other => Err(format!("unknown detection tag '{other}'")),
        }
    }
}

/// One photometric measurement
#[derive(Debug, Clone, PartialEq)]
pub struct LightcurveRow {
    /// Acquisition time (MJD)
    pub time: f64,
    pub band: String,
    pub mag: Option<f64>,
    pub magerr: Option<f64>,
    /// `None` for sources without a tag column: an undifferentiated detection
    pub tag: Option<DetectionTag>,
    /// Unique within a lightcurve when present; upper limits usually have none
    pub candidate_id: Option<i64>,
    pub ra: Option<f64>,
    pub dec: Option<f64>,
    /// Broker-native pass-through fields
    pub extra: BTreeMap<String, Value>,
}

impl LightcurveRow {
    pub fn new(time: f64, band: impl Into<String>) -> Self {
        Self {
            time,
            band: band.into(),
            mag: None,
            magerr: None,
            tag: None,
            candidate_id: None,
            ra: None,
            dec: None,
            extra: BTreeMap::new(),
        }
    }

    /// Whether the row counts as a detection (valid, or untagged)
    pub fn is_detection(&self) -> bool {
        matches!(self.tag, None | Some(DetectionTag::Valid))
    }
}

/// Rows sorted ascending by time
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Lightcurve {
    rows: Vec<LightcurveRow>,
}

impl Lightcurve {
    /// Build a lightcurve, sorting rows by time (stable for equal times)
    pub fn new(mut rows: Vec<LightcurveRow>) -> Self {
        rows.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[LightcurveRow] {
        &self.rows
    }

    pub fn detections(&self) -> impl Iterator<Item = &LightcurveRow> {
        self.rows.iter().filter(|r| r.is_detection())
    }

    pub fn upper_limits(&self) -> impl Iterator<Item = &LightcurveRow> {
        self.rows
            .iter()
            .filter(|r| r.tag == Some(DetectionTag::Upperlim))
    }

    pub fn bad_quality(&self) -> impl Iterator<Item = &LightcurveRow> {
        self.rows
            .iter()
            .filter(|r| r.tag == Some(DetectionTag::Badqual))
    }

    /// Drop rows whose candidate identifier was already seen, keeping the first
    pub fn dedup_candidates(&mut self) -> usize {
        let before = self.rows.len();
        let mut seen = HashSet::new();
        self.rows.retain(|row| match row.candidate_id {
            Some(id) => seen.insert(id),
            None => true,
        });
        before - self.rows.len()
    }

    /// Mean of the non-null ra and dec values.
    ///
    /// Each axis is averaged independently; `None` if either axis has no
    /// finite values.
    pub fn mean_coordinates(&self) -> Option<(f64, f64)> {
        fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
            let (sum, count) = values
                .filter(|v| v.is_finite())
                .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
            (count > 0).then(|| sum / count as f64)
        }

        let ra = mean(self.rows.iter().filter_map(|r| r.ra))?;
        let dec = mean(self.rows.iter().filter_map(|r| r.dec))?;
        Some((ra, dec))
    }

    /// Write the lightcurve as CSV (header always written, even with no rows)
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let extra_columns: BTreeSet<&str> = self
            .rows
            .iter()
            .flat_map(|row| row.extra.keys().map(String::as_str))
            .filter(|key| !FIXED_COLUMNS.contains(key))
            .collect();

        let mut csv_writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(writer);

        let header: Vec<&str> = FIXED_COLUMNS
            .iter()
            .copied()
            .chain(extra_columns.iter().copied())
            .collect();
        csv_writer.write_record(&header)?;

        for row in &self.rows {
            let mut record = vec![
                row.time.to_string(),
                row.band.clone(),
                opt_to_cell(row.mag),
                opt_to_cell(row.magerr),
                row.tag.map(|t| t.as_str().to_string()).unwrap_or_default(),
                row.candidate_id.map(|id| id.to_string()).unwrap_or_default(),
                opt_to_cell(row.ra),
                opt_to_cell(row.dec),
            ];
            for column in &extra_columns {
                record.push(row.extra.get(*column).map(value_to_cell).unwrap_or_default());
            }
            csv_writer.write_record(&record)?;
        }

        csv_writer
            .flush()
            .map_err(|e| BrokerError::serialization(format!("flush lightcurve csv: {e}")))?;
        Ok(())
    }

    /// Read a lightcurve from CSV.
    ///
    /// Only `time` is mandatory; missing fixed columns read as empty. Rows are
    /// re-sorted, so a hand-edited file is still returned in time order.
    pub fn read_csv<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        if headers.is_empty() || (headers.len() == 1 && headers.get(0) == Some("")) {
            return Err(BrokerError::serialization("lightcurve csv has no header"));
        }
        let position = |name: &str| headers.iter().position(|h| h == name);
        let time_idx = position("time")
            .ok_or_else(|| BrokerError::serialization("lightcurve csv has no 'time' column"))?;
        let band_idx = position("band");
        let mag_idx = position("mag");
        let magerr_idx = position("magerr");
        let tag_idx = position("tag");
        let candidate_idx = position("candidate_id");
        let ra_idx = position("ra");
        let dec_idx = position("dec");

        let mut rows = Vec::new();
        for (line, record) in csv_reader.records().enumerate() {
            let record = record?;
            let cell = |idx: Option<usize>| idx.and_then(|i| record.get(i)).unwrap_or("");

            let time = parse_f64(cell(Some(time_idx)))
                .ok_or_else(|| BrokerError::serialization(format!("row {line}: invalid time")))?;
            let tag = match cell(tag_idx) {
                "" => None,
                raw => Some(
                    raw.parse::<DetectionTag>()
                        .map_err(|e| BrokerError::serialization(format!("row {line}: {e}")))?,
                ),
            };

            let mut extra = BTreeMap::new();
            for (idx, name) in headers.iter().enumerate() {
                if FIXED_COLUMNS.contains(&name) {
                    continue;
                }
                let value = cell_to_value(record.get(idx).unwrap_or(""));
                if !value.is_null() {
                    extra.insert(name.to_string(), value);
                }
            }

            rows.push(LightcurveRow {
                time,
                band: cell(band_idx).to_string(),
                mag: parse_f64(cell(mag_idx)),
                magerr: parse_f64(cell(magerr_idx)),
                tag,
                candidate_id: cell(candidate_idx).parse::<i64>().ok(),
                ra: parse_f64(cell(ra_idx)),
                dec: parse_f64(cell(dec_idx)),
                extra,
            });
        }

        Ok(Lightcurve::new(rows))
    }
}

impl From<Vec<LightcurveRow>> for Lightcurve {
    fn from(rows: Vec<LightcurveRow>) -> Self {
        Lightcurve::new(rows)
    }
}

fn opt_to_cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn parse_f64(cell: &str) -> Option<f64> {
    cell.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}
