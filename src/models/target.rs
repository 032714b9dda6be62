//! # Tracked Objects
//!
//! A tracked object ("target") is created once per `objectId` and lives for
//! the rest of the run. Each broker attaches its own [`BrokerData`].

use crate::models::lightcurve::Lightcurve;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Sky position in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub ra: f64,
    pub dec: f64,
}

impl Coordinates {
    /// Validated position; ra is wrapped into [0, 360)
    pub fn try_new(ra: f64, dec: f64) -> Option<Self> {
        if !ra.is_finite() || !dec.is_finite() || !(-90.0..=90.0).contains(&dec) {
            return None;
        }
        Some(Self {
            ra: ra.rem_euclid(360.0),
            dec,
        })
    }
}

/// Per-(object, broker) data
#[derive(Debug, Clone, Default)]
pub struct BrokerData {
    pub lightcurve: Option<Lightcurve>,
    /// Image cutouts keyed by kind (science, template, difference)
    pub cutouts: HashMap<String, Value>,
    /// Broker-supplied parameters such as catalog redshift
    pub parameters: Map<String, Value>,
}

impl BrokerData {
    pub fn add_lightcurve(&mut self, lightcurve: Lightcurve) {
        self.lightcurve = Some(lightcurve);
    }
}

#[derive(Debug, Clone)]
pub struct TrackedObject {
    pub object_id: String,
    pub coordinates: Option<Coordinates>,
    pub broker_data: HashMap<String, BrokerData>,
    pub updated: bool,
    pub send_updates: bool,
    /// Append-only; downstream consumers clear it
    pub update_messages: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl TrackedObject {
    pub fn new(
        object_id: impl Into<String>,
        coordinates: Option<Coordinates>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            object_id: object_id.into(),
            coordinates,
            broker_data: HashMap::new(),
            updated: false,
            send_updates: false,
            update_messages: Vec::new(),
            created_at,
        }
    }

    pub fn ra(&self) -> Option<f64> {
        self.coordinates.map(|c| c.ra)
    }

    pub fn dec(&self) -> Option<f64> {
        self.coordinates.map(|c| c.dec)
    }

    /// Install coordinates; returns false (leaving the object unchanged) if invalid
    pub fn update_coordinates(&mut self, ra: f64, dec: f64) -> bool {
        match Coordinates::try_new(ra, dec) {
            Some(coordinates) => {
                self.coordinates = Some(coordinates);
                true
            }
            None => false,
        }
    }

    pub fn broker_data(&self, broker: &str) -> Option<&BrokerData> {
        self.broker_data.get(broker)
    }

    /// Broker data for `broker`, created empty on first access
    pub fn broker_data_mut(&mut self, broker: &str) -> &mut BrokerData {
        self.broker_data.entry(broker.to_string()).or_default()
    }

    pub fn push_message(&mut self, message: impl Into<String>) {
        self.update_messages.push(message.into());
    }
}
