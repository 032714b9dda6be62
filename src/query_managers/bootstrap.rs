//! # Target Bootstrapper
//!
//! Registers a tracked object the first time an `objectId` is seen. The
//! position comes from the first coordinate field pair the alert fully
//! populates; objects whose alerts carry no usable pair are still created,
//! with null coordinates.

use crate::models::{Alert, Coordinates, Lightcurve, TrackedObject};
use crate::registry::TargetRegistry;
use crate::utils::serde::value_as_f64;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Coordinate field pairs in priority order
pub const DEFAULT_COORDINATE_GUESSES: [(&str, &str); 3] =
    [("ramean", "decmean"), ("ra", "dec"), ("RA", "Dec")];

/// First `(ra, dec)` pair in `guesses` where both fields are present and numeric
pub fn guess_coordinates<S: AsRef<str>>(alert: &Alert, guesses: &[(S, S)]) -> Option<(f64, f64)> {
    guesses.iter().find_map(|(ra_field, dec_field)| {
        let ra = alert.get(ra_field.as_ref()).and_then(value_as_f64)?;
        let dec = alert.get(dec_field.as_ref()).and_then(value_as_f64)?;
        Some((ra, dec))
    })
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BootstrapOutcome {
    pub added: Vec<String>,
    pub existing: Vec<String>,
    /// Alerts without an `objectId`
    pub skipped: usize,
}

#[derive(Debug, Clone)]
pub struct TargetBootstrapper {
    broker: String,
    registry: Arc<TargetRegistry>,
    coordinate_guesses: Vec<(String, String)>,
}

impl TargetBootstrapper {
    pub fn new(
        broker: impl Into<String>,
        registry: Arc<TargetRegistry>,
        coordinate_guesses: Vec<(String, String)>,
    ) -> Self {
        Self {
            broker: broker.into(),
            registry,
            coordinate_guesses,
        }
    }

    pub fn bootstrap(&self, alerts: &[Alert], t_ref: DateTime<Utc>) -> BootstrapOutcome {
        let mut outcome = BootstrapOutcome::default();

        for alert in alerts {
            let Some(object_id) = alert.object_id() else {
                warn!(broker = %self.broker, "Alert without objectId; no target created");
                outcome.skipped += 1;
                continue;
            };
            if self.registry.contains(object_id) {
                outcome.existing.push(object_id.to_string());
                continue;
            }

            let created = self
                .registry
                .insert_with(object_id, || self.target_from_alert(object_id, alert, t_ref));
            if created {
                outcome.added.push(object_id.to_string());
            } else {
                outcome.existing.push(object_id.to_string());
            }
        }

        debug!(
            broker = %self.broker,
            added = outcome.added.len(),
            existing = outcome.existing.len(),
            "Targets bootstrapped from alerts"
        );
        outcome
    }

    fn target_from_alert(&self, object_id: &str, alert: &Alert, t_ref: DateTime<Utc>) -> TrackedObject {
        let coordinates = match guess_coordinates(alert, &self.coordinate_guesses) {
            Some((ra, dec)) => {
                let coordinates = Coordinates::try_new(ra, dec);
                if coordinates.is_none() {
                    warn!(
                        broker = %self.broker,
                        object_id = %object_id,
                        ra = ra,
                        dec = dec,
                        "Alert position is out of range; target created with null coordinates"
                    );
                }
                coordinates
            }
            None => {
                warn!(
                    broker = %self.broker,
                    object_id = %object_id,
                    "No coordinate fields in alert; target created with null coordinates"
                );
                None
            }
        };
        TrackedObject::new(object_id, coordinates, t_ref)
    }

    /// Register an object from its first coordinate-bearing lightcurve.
    ///
    /// Returns false if the object already exists or the lightcurve has no
    /// usable position.
    pub fn bootstrap_from_lightcurve(
        &self,
        object_id: &str,
        lightcurve: &Lightcurve,
        t_ref: DateTime<Utc>,
    ) -> bool {
        if self.registry.contains(object_id) {
            return false;
        }
        let Some(coordinates) = lightcurve
            .mean_coordinates()
            .and_then(|(ra, dec)| Coordinates::try_new(ra, dec))
        else {
            debug!(
                broker = %self.broker,
                object_id = %object_id,
                "Lightcurve has no position; no target created"
            );
            return false;
        };

        let created = self.registry.insert_with(object_id, || {
            TrackedObject::new(object_id, Some(coordinates), t_ref)
        });
        if created {
            debug!(broker = %self.broker, object_id = %object_id, "Target created from lightcurve");
        }
        created
    }
}
