//! # Registry Infrastructure
//!
//! Shared registries for the broker query subsystem.
//!
//! ## Available Registries
//!
//! - **TargetRegistry**: run-wide map of tracked objects, shared by every
//!   broker query manager and the downstream scoring pipeline
//!
//! ## Usage
//!
//! ```rust
//! use broker_query::models::TrackedObject;
//! use broker_query::registry::TargetRegistry;
//! use std::sync::Arc;
//!
//! let registry = Arc::new(TargetRegistry::new());
//! registry.insert(TrackedObject::new("ZTF23abcdefg", None, chrono::Utc::now()));
//!
//! registry.with_target_mut("ZTF23abcdefg", |target| {
//!     target.updated = true;
//! });
//! assert_eq!(registry.with_target("ZTF23abcdefg", |t| t.updated), Some(true));
//! ```

pub mod target_registry;

pub use target_registry::TargetRegistry;
