//! # Target Registry
//!
//! The run-wide `objectId -> TrackedObject` map shared by every broker query
//! manager and the downstream scoring pipeline.
//!
//! ## Key Features
//!
//! - **Globally unique keys**: insertion never replaces an existing object
//! - **Serialized per-object writes**: mutation goes through
//!   [`TargetRegistry::with_target_mut`], which holds the entry's shard write
//!   lock for the duration of the closure, so concurrent managers cannot lose
//!   flag or message-log updates
//!
//! Closures passed to `with_target`/`with_target_mut` must not call back into
//! the registry: the shard lock is held while they run.

use crate::models::TrackedObject;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

#[derive(Debug, Default)]
pub struct TargetRegistry {
    targets: DashMap<String, TrackedObject>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self {
            targets: DashMap::new(),
        }
    }

    pub fn contains(&self, object_id: &str) -> bool {
        self.targets.contains_key(object_id)
    }

    /// Insert a new object; returns false and leaves the registry untouched
    /// if the id is already tracked
    pub fn insert(&self, target: TrackedObject) -> bool {
        match self.targets.entry(target.object_id.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                debug!(object_id = %target.object_id, "Registering tracked object");
                slot.insert(target);
                true
            }
        }
    }

    /// Insert the object produced by `create` unless the id is already tracked.
    /// Returns true if `create` ran.
    pub fn insert_with<F>(&self, object_id: &str, create: F) -> bool
    where
        F: FnOnce() -> TrackedObject,
    {
        match self.targets.entry(object_id.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(create());
                true
            }
        }
    }

    /// Snapshot of one object
    pub fn get(&self, object_id: &str) -> Option<TrackedObject> {
        self.targets.get(object_id).map(|entry| entry.value().clone())
    }

    pub fn with_target<R, F>(&self, object_id: &str, f: F) -> Option<R>
    where
        F: FnOnce(&TrackedObject) -> R,
    {
        self.targets.get(object_id).map(|entry| f(entry.value()))
    }

    pub fn with_target_mut<R, F>(&self, object_id: &str, f: F) -> Option<R>
    where
        F: FnOnce(&mut TrackedObject) -> R,
    {
        self.targets
            .get_mut(object_id)
            .map(|mut entry| f(entry.value_mut()))
    }

    /// All tracked ids, sorted for deterministic iteration
    pub fn object_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.targets.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
