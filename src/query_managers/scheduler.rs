//! # Lightcurve Scheduler
//!
//! Staleness-driven refresh: an object is due when its cache file is older
//! than the interval. `now` is a parameter so schedules can be evaluated
//! against a synthetic clock.

use crate::config::MissingFilePolicy;
use crate::query_managers::cache::LightcurveCache;
use crate::registry::TargetRegistry;
use crate::utils::fs::file_age;
use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Clone, Copy, Default)]
pub struct LightcurveScheduler {
    missing_file_policy: MissingFilePolicy,
}

impl LightcurveScheduler {
    pub fn new(missing_file_policy: MissingFilePolicy) -> Self {
        Self {
            missing_file_policy,
        }
    }

    /// Whether a file of the given age needs refreshing.
    ///
    /// `None` is a missing file, which has infinite age under
    /// [`MissingFilePolicy::Immediate`]. A file written after `now` has a
    /// negative age and is never due.
    pub fn is_due(&self, age: Option<Duration>, interval: Duration) -> bool {
        match age {
            None => self.missing_file_policy == MissingFilePolicy::Immediate,
            Some(age) => age > interval,
        }
    }

    /// Tracked objects whose cached lightcurve is stale
    pub async fn due(
        &self,
        registry: &TargetRegistry,
        cache: &LightcurveCache,
        interval: Duration,
        now: DateTime<Utc>,
    ) -> Vec<String> {
        self.filter_due(registry.object_ids(), cache, interval, now).await
    }

    /// The subset of `object_ids` that is due, in input order
    pub async fn filter_due<I>(
        &self,
        object_ids: I,
        cache: &LightcurveCache,
        interval: Duration,
        now: DateTime<Utc>,
    ) -> Vec<String>
    where
        I: IntoIterator<Item = String>,
    {
        let mut due = Vec::new();
        for object_id in object_ids {
            let age = file_age(&cache.lightcurve_file(&object_id), now).await;
            if self.is_due(age, interval) {
                due.push(object_id);
            }
        }
        due
    }
}
