//! # Orchestration
//!
//! Runs every configured broker's query cycle against one shared target
//! registry. Brokers run concurrently with each other; each cycle is
//! sequential internally.

pub mod query_orchestrator;

pub use query_orchestrator::QueryOrchestrator;
