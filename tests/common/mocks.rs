use async_trait::async_trait;
use broker_query::error::{BrokerError, Result};
use broker_query::models::Lightcurve;
use broker_query::query_managers::{FetchedLightcurve, LightcurveSource};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

/// Bulk source serving canned lightcurves.
///
/// Calls listed in `failing_calls` (0-based) raise a transient error; every
/// other call returns the stored lightcurve of each requested id that has
/// one. Every request is recorded.
#[derive(Debug, Default)]
pub struct ScriptedLightcurveSource {
    lightcurves: Mutex<HashMap<String, Lightcurve>>,
    failing_calls: HashSet<usize>,
    calls: Mutex<Vec<Vec<String>>>,
}

impl ScriptedLightcurveSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(calls: impl IntoIterator<Item = usize>) -> Self {
        Self {
            failing_calls: calls.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn with_lightcurve(self, object_id: &str, lightcurve: Lightcurve) -> Self {
        self.set_lightcurve(object_id, lightcurve);
        self
    }

    /// Replace what the source returns for `object_id`
    pub fn set_lightcurve(&self, object_id: &str, lightcurve: Lightcurve) {
        self.lightcurves.lock().insert(object_id.to_string(), lightcurve);
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().clone()
    }

    pub fn requested_ids(&self) -> Vec<String> {
        self.calls.lock().iter().flatten().cloned().collect()
    }
}

#[async_trait]
impl LightcurveSource for ScriptedLightcurveSource {
    async fn fetch_lightcurves(&self, object_ids: &[String]) -> Result<Vec<FetchedLightcurve>> {
        let call = {
            let mut calls = self.calls.lock();
            calls.push(object_ids.to_vec());
            calls.len() - 1
        };
        if self.failing_calls.contains(&call) {
            return Err(BrokerError::transient_fetch(
                "scripted bulk query",
                format!("call {call} scripted to fail"),
            ));
        }

        let lightcurves = self.lightcurves.lock();
        Ok(object_ids
            .iter()
            .filter_map(|id| {
                lightcurves.get(id).map(|lightcurve| FetchedLightcurve {
                    object_id: id.clone(),
                    lightcurve: lightcurve.clone(),
                })
            })
            .collect())
    }
}
