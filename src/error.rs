//! # Broker Query Errors
//!
//! Structured error taxonomy for the broker query subsystem. Only
//! [`BrokerError::Configuration`] is allowed to stop a manager from starting;
//! every other variant is logged by the stage that observed it and folded
//! into that stage's partial-success outcome.

use crate::config::ConfigurationError;
use crate::messaging::MessagingError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BrokerError {
    /// Required connection or credential fields are missing or invalid
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// A single chunk request or alert decode failed
    #[error("Transient fetch error: {operation}: {message}")]
    TransientFetch { operation: String, message: String },

    /// Malformed cache file, or data missing identifiers/coordinates
    #[error("Data integrity error: {object_id}: {message}")]
    DataIntegrity { object_id: String, message: String },

    /// Cumulative failures exceeded the configured budget
    #[error("Circuit breaker is open for {component}: {failures} failures exceed limit of {max_failures}")]
    CircuitBreakOpen {
        component: String,
        failures: u64,
        max_failures: u64,
    },

    #[error("Operation {operation} timed out after {timeout_seconds}s")]
    Timeout {
        operation: String,
        timeout_seconds: u64,
    },

    #[error("I/O error: {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("HTTP error: {message}")]
    Http { message: String },

    #[error("Messaging error: {0}")]
    Messaging(#[from] MessagingError),
}

impl BrokerError {
    /// Create a transient fetch error
    pub fn transient_fetch(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TransientFetch {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a data integrity error
    pub fn data_integrity(object_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DataIntegrity {
            object_id: object_id.into(),
            message: message.into(),
        }
    }

    /// Create a circuit breaker open error
    pub fn circuit_break_open(component: impl Into<String>, failures: u64, max_failures: u64) -> Self {
        Self::CircuitBreakOpen {
            component: component.into(),
            failures,
            max_failures,
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, timeout_seconds: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_seconds,
        }
    }

    /// Create an I/O error with path context
    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create an HTTP error
    pub fn http(message: impl Into<String>) -> Self {
        Self::Http {
            message: message.into(),
        }
    }

    /// Whether the error should count against a fetch failure budget
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::TransientFetch { .. } | Self::Timeout { .. } | Self::Http { .. } | Self::Messaging(_)
        )
    }
}

impl From<serde_json::Error> for BrokerError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

impl From<csv::Error> for BrokerError {
    fn from(err: csv::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

impl From<reqwest::Error> for BrokerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::timeout("http_request", 0)
        } else {
            Self::http(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, BrokerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_includes_context() {
        let err = BrokerError::circuit_break_open("lasair", 12, 10);
        assert_eq!(
            err.to_string(),
            "Circuit breaker is open for lasair: 12 failures exceed limit of 10"
        );

        let err = BrokerError::data_integrity("ZTF23abc", "no coordinates");
        assert!(err.to_string().contains("ZTF23abc"));
    }

    #[test]
    fn test_transient_classification() {
        assert!(BrokerError::transient_fetch("lightcurves", "boom").is_transient());
        assert!(BrokerError::timeout("lightcurves", 60).is_transient());
        assert!(!BrokerError::data_integrity("x", "y").is_transient());
        assert!(!BrokerError::Configuration(ConfigurationError::missing_required_field("host", "kafka"))
            .is_transient());
    }
}
