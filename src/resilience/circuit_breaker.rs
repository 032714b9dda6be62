//! # Cumulative Circuit Breaker
//!
//! Failure budget for one bulk fetch call. Unlike a consecutive-failure
//! breaker it never resets on success and never half-opens: once the
//! cumulative number of failed items exceeds `max_failures` the circuit opens
//! and stays open for the rest of the call. It gates *future* requests only;
//! an in-flight request is never cancelled.

use crate::error::BrokerError;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use tracing::{debug, warn};

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CircuitState {
    /// Requests are allowed
    Closed = 0,
    /// Budget exhausted; no further requests in this call
    Open = 1,
}

impl From<u8> for CircuitState {
    fn from(value: u8) -> Self {
        match value {
            0 => CircuitState::Closed,
            _ => CircuitState::Open, // Default to safest state
        }
    }
}

/// Point-in-time view of a breaker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerMetrics {
    pub total_calls: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub max_failures: u64,
    pub current_state: CircuitState,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    max_failures: u64,
    state: AtomicU8,
    total_calls: AtomicU64,
    success_count: AtomicU64,
    failure_count: AtomicU64,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, max_failures: u64) -> Self {
        let name = name.into();
        debug!(component = %name, max_failures = max_failures, "Failure budget initialized");
        Self {
            name,
            max_failures,
            state: AtomicU8::new(CircuitState::Closed as u8),
            total_calls: AtomicU64::new(0),
            success_count: AtomicU64::new(0),
            failure_count: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> CircuitState {
        CircuitState::from(self.state.load(Ordering::Acquire))
    }

    /// Whether another request may be issued
    pub fn should_allow(&self) -> bool {
        self.state() == CircuitState::Closed
    }

    /// Pre-flight check returning the open-circuit error
    pub fn check(&self) -> Result<(), BrokerError> {
        if self.should_allow() {
            Ok(())
        } else {
            Err(BrokerError::circuit_break_open(
                self.name.clone(),
                self.failures(),
                self.max_failures,
            ))
        }
    }

    pub fn record_success(&self, items: u64) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        self.success_count.fetch_add(items, Ordering::Relaxed);
    }

    /// Count `items` failed ids against the budget; opens once the total exceeds it
    pub fn record_failures(&self, items: u64) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        let failures = self.failure_count.fetch_add(items, Ordering::AcqRel) + items;
        if failures > self.max_failures {
            self.transition_to_open(failures);
        }
    }

    fn transition_to_open(&self, failures: u64) {
        let previous = self.state.swap(CircuitState::Open as u8, Ordering::AcqRel);
        if CircuitState::from(previous) == CircuitState::Closed {
            warn!(
                component = %self.name,
                failures = failures,
                max_failures = self.max_failures,
                "Too many failed queries; circuit opened for the rest of this call"
            );
        }
    }

    pub fn failures(&self) -> u64 {
        self.failure_count.load(Ordering::Acquire)
    }

    pub fn metrics(&self) -> CircuitBreakerMetrics {
        CircuitBreakerMetrics {
            total_calls: self.total_calls.load(Ordering::Relaxed),
            success_count: self.success_count.load(Ordering::Relaxed),
            failure_count: self.failures(),
            max_failures: self.max_failures,
            current_state: self.state(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stays_closed_at_budget() {
        let circuit = CircuitBreaker::new("test", 3);
        circuit.record_failures(2);
        circuit.record_failures(1);
        assert_eq!(circuit.state(), CircuitState::Closed);
        assert!(circuit.check().is_ok());
    }

    #[test]
    fn test_opens_when_budget_exceeded() {
        let circuit = CircuitBreaker::new("test", 1);
        circuit.record_success(3);
        circuit.record_failures(2);
        assert_eq!(circuit.state(), CircuitState::Open);
        assert!(matches!(
            circuit.check(),
            Err(BrokerError::CircuitBreakOpen { failures: 2, max_failures: 1, .. })
        ));
    }

    #[test]
    fn test_success_does_not_reset_failures() {
        let circuit = CircuitBreaker::new("test", 2);
        circuit.record_failures(2);
        circuit.record_success(10);
        circuit.record_failures(1);
        assert_eq!(circuit.state(), CircuitState::Open);

        let metrics = circuit.metrics();
        assert_eq!(metrics.total_calls, 3);
        assert_eq!(metrics.success_count, 10);
        assert_eq!(metrics.failure_count, 3);
        assert_eq!(metrics.current_state, CircuitState::Open);
    }

    #[test]
    fn test_zero_budget_opens_on_first_failure() {
        let circuit = CircuitBreaker::new("test", 0);
        circuit.record_success(5);
        assert!(circuit.should_allow());
        circuit.record_failures(1);
        assert!(!circuit.should_allow());
    }
}
