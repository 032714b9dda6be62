#![allow(clippy::doc_markdown)] // Allow technical terms like objectId, MJD in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Broker Query Core
//!
//! Alert ingestion and lightcurve caching for astronomical transients.
//!
//! ## Overview
//!
//! A broker query manager listens for pub/sub alerts from an external broker,
//! registers a tracked object for every new `objectId`, pulls full
//! lightcurves in chunks from the broker's bulk API, and keeps one cache file
//! per object. Every cycle ends by flagging the objects that received alerts
//! so a downstream scoring pipeline can pick them up.
//!
//! ## Key Features
//!
//! - **Bounded listening**: per-topic poll budgets, poll errors skipped
//! - **Resumable bulk fetches**: chunked requests with a cumulative failure
//!   budget; unattempted ids are simply due again next cycle
//! - **Monotonic cache**: a shorter fetch result never replaces a longer
//!   cached history; writes are atomic
//! - **Shared registry**: one `objectId -> TrackedObject` map for every broker,
//!   with per-object write serialization
//!
//! ## Module Organization
//!
//! - [`query_managers`] - the cycle stages, the [`QueryManager`] interface and the Lasair variant
//! - [`orchestration`] - runs every broker's cycle
//! - [`registry`] - the shared target registry
//! - [`models`] - alerts, lightcurves and tracked objects
//! - [`messaging`] - pub/sub seams and an in-process topic bus
//! - [`resilience`] - failure budget for bulk queries
//! - [`config`] - layered TOML/environment configuration
//! - [`error`] - structured error handling
//! - [`logging`] - structured logging bootstrap
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use broker_query::config::BrokerConfig;
//! use broker_query::query_managers::{BrokerQueryManager, LasairProfile, QueryManager};
//! use broker_query::registry::TargetRegistry;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = Arc::new(TargetRegistry::new());
//! let manager = BrokerQueryManager::builder(
//!     LasairProfile,
//!     BrokerConfig::with_token("my-lasair-token"),
//!     registry.clone(),
//!     "data",
//! )
//! .build()?;
//!
//! let report = manager.run_cycle(chrono::Utc::now()).await;
//! println!("fetched {} lightcurves", report.scheduled_fetch.succeeded.len());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod messaging;
pub mod models;
pub mod orchestration;
pub mod query_managers;
pub mod registry;
pub mod resilience;
pub mod utils;

pub use config::{BrokerConfig, BrokerQueryConfig, ConfigManager, ConfigurationError};
pub use error::{BrokerError, Result};
pub use models::{Alert, Lightcurve, LightcurveRow, TrackedObject};
pub use orchestration::QueryOrchestrator;
pub use query_managers::{BrokerQueryManager, CycleReport, QueryManager};
pub use registry::TargetRegistry;
