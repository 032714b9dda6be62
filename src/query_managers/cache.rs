//! # Lightcurve Cache
//!
//! One CSV file per object under the broker's `lightcurves/` directory.
//! Writes replace the whole file atomically; unreadable files read as absent.
//!
//! The merge rule guarantees a cached lightcurve never shrinks because of a
//! fetch: a shorter incoming history is discarded in favour of what is
//! already stored.

use crate::config::EmptyResultPolicy;
use crate::error::Result;
use crate::models::{Lightcurve, TrackedObject};
use crate::utils::fs::{safe_file_stem, write_atomic};
use std::path::PathBuf;
use tracing::{debug, warn};

/// Result of merging incoming rows over an existing cache
#[derive(Debug, Clone, PartialEq)]
pub struct MergeDecision {
    pub lightcurve: Lightcurve,
    pub was_updated: bool,
}

/// Monotonic-growth merge.
///
/// With no existing cache the incoming rows are accepted unconditionally,
/// even when empty. Otherwise they are accepted only if they are at least as
/// long as the existing rows. Under [`EmptyResultPolicy::Ignore`] an empty
/// incoming result never replaces an existing cache.
pub fn merge(
    existing: Option<Lightcurve>,
    incoming: Lightcurve,
    policy: EmptyResultPolicy,
) -> MergeDecision {
    match existing {
        None => MergeDecision {
            lightcurve: incoming,
            was_updated: true,
        },
        Some(existing) => {
            let ignored_empty = policy == EmptyResultPolicy::Ignore && incoming.is_empty();
            if !ignored_empty && incoming.len() >= existing.len() {
                MergeDecision {
                    lightcurve: incoming,
                    was_updated: true,
                }
            } else {
                MergeDecision {
                    lightcurve: existing,
                    was_updated: false,
                }
            }
        }
    }
}

/// Install the mean position of `lightcurve` on a target that has none.
///
/// Returns true if coordinates were installed. Targets that already have
/// coordinates are left alone.
pub fn backfill_coordinates(target: &mut TrackedObject, lightcurve: &Lightcurve) -> bool {
    if target.coordinates.is_some() {
        return false;
    }
    match lightcurve.mean_coordinates() {
        Some((ra, dec)) if target.update_coordinates(ra, dec) => {
            debug!(
                object_id = %target.object_id,
                ra = ra,
                dec = dec,
                "Coordinates backfilled from lightcurve"
            );
            true
        }
        Some((ra, dec)) => {
            warn!(
                object_id = %target.object_id,
                ra = ra,
                dec = dec,
                "Lightcurve mean position is not a valid sky position"
            );
            false
        }
        None => {
            warn!(
                object_id = %target.object_id,
                "Cannot backfill coordinates: lightcurve has no ra/dec values"
            );
            false
        }
    }
}

#[derive(Debug, Clone)]
pub struct LightcurveCache {
    broker: String,
    directory: PathBuf,
    empty_result_policy: EmptyResultPolicy,
}

impl LightcurveCache {
    pub fn new(
        broker: impl Into<String>,
        directory: impl Into<PathBuf>,
        empty_result_policy: EmptyResultPolicy,
    ) -> Self {
        Self {
            broker: broker.into(),
            directory: directory.into(),
            empty_result_policy,
        }
    }

    pub fn empty_result_policy(&self) -> EmptyResultPolicy {
        self.empty_result_policy
    }

    pub fn lightcurve_file(&self, object_id: &str) -> PathBuf {
        self.directory
            .join(format!("{}.csv", safe_file_stem(object_id)))
    }

    /// Replace the cached rows for `object_id`
    pub async fn store(&self, object_id: &str, lightcurve: &Lightcurve) -> Result<()> {
        let mut buffer = Vec::new();
        lightcurve.write_csv(&mut buffer)?;
        write_atomic(&self.lightcurve_file(object_id), &buffer).await?;
        debug!(
            broker = %self.broker,
            object_id = %object_id,
            rows = lightcurve.len(),
            "Lightcurve cached"
        );
        Ok(())
    }

    /// Cached rows, or `None` if the file is missing or cannot be parsed
    pub async fn load(&self, object_id: &str) -> Option<Lightcurve> {
        let path = self.lightcurve_file(object_id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(
                    broker = %self.broker,
                    object_id = %object_id,
                    path = %path.display(),
                    error = %e,
                    "Unreadable lightcurve file treated as absent"
                );
                return None;
            }
        };

        match Lightcurve::read_csv(bytes.as_slice()) {
            Ok(lightcurve) => Some(lightcurve),
            Err(e) => {
                warn!(
                    broker = %self.broker,
                    object_id = %object_id,
                    path = %path.display(),
                    error = %e,
                    "Malformed lightcurve file treated as absent"
                );
                None
            }
        }
    }

    /// Merge `incoming` over the stored rows and write the result if it was
    /// accepted. A rejected merge leaves the file untouched.
    pub async fn store_merged(&self, object_id: &str, incoming: Lightcurve) -> Result<MergeDecision> {
        let existing = self.load(object_id).await;
        let existing_rows = existing.as_ref().map(Lightcurve::len);
        let decision = merge(existing, incoming, self.empty_result_policy);

        if decision.was_updated {
            self.store(object_id, &decision.lightcurve).await?;
        } else {
            debug!(
                broker = %self.broker,
                object_id = %object_id,
                existing_rows = existing_rows,
                "Shorter fetch result discarded; cache kept"
            );
        }
        Ok(decision)
    }
}
