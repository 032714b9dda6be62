//! # Resilience Module
//!
//! Failure budgeting for bulk broker queries.
//!
//! ## Usage
//!
//! ```rust
//! use broker_query::resilience::{CircuitBreaker, CircuitState};
//!
//! let circuit = CircuitBreaker::new("lasair_lightcurves", 1);
//! circuit.record_success(3);
//! circuit.record_failures(2);
//! assert_eq!(circuit.state(), CircuitState::Open);
//! assert!(!circuit.should_allow());
//! ```

pub mod circuit_breaker;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerMetrics, CircuitState};
