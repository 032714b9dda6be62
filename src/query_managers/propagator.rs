//! # Update Propagator
//!
//! Flags every target that received an alert this cycle and appends a
//! notification to its message log.

use crate::models::Alert;
use crate::registry::TargetRegistry;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PropagationOutcome {
    pub notified: Vec<String>,
    /// Alert object ids with no tracked object
    pub unknown: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct UpdatePropagator {
    broker: String,
    label: String,
    registry: Arc<TargetRegistry>,
}

impl UpdatePropagator {
    /// `label` names the broker in messages, e.g. `LASAIR`
    pub fn new(broker: impl Into<String>, label: impl Into<String>, registry: Arc<TargetRegistry>) -> Self {
        Self {
            broker: broker.into(),
            label: label.into(),
            registry,
        }
    }

    pub fn format_message(&self, topic: &str, timestamp: &str) -> String {
        format!(
            "{} alert from {topic}\n     broadcast at jd={timestamp}\n",
            self.label
        )
    }

    pub fn propagate(&self, alerts: &[Alert]) -> PropagationOutcome {
        let mut outcome = PropagationOutcome::default();

        for alert in alerts {
            let Some(object_id) = alert.object_id() else {
                continue;
            };
            let message = self.format_message(
                alert.topic().unwrap_or("unknown topic"),
                alert.alert_timestamp().unwrap_or("unknown"),
            );

            let found = self.registry.with_target_mut(object_id, |target| {
                target.updated = true;
                target.send_updates = true;
                target.push_message(message);
            });
            match found {
                Some(()) => outcome.notified.push(object_id.to_string()),
                None => {
                    warn!(
                        broker = %self.broker,
                        object_id = %object_id,
                        "Alert for an untracked object; no update recorded"
                    );
                    outcome.unknown.push(object_id.to_string());
                }
            }
        }

        debug!(
            broker = %self.broker,
            notified = outcome.notified.len(),
            unknown = outcome.unknown.len(),
            "Alert updates propagated"
        );
        outcome
    }
}
