//! # Messaging Error Types
//!
//! Structured error types for pub/sub consumers. None of these are fatal:
//! the listener logs them and moves on to the next message or topic.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MessagingError {
    #[error("Failed to subscribe to {topic} on {host}: {message}")]
    Subscribe {
        host: String,
        topic: String,
        message: String,
    },

    #[error("Poll error on {topic}: {message}")]
    Poll { topic: String, message: String },

    #[error("Failed to decode message from {topic}: {message}")]
    Decode { topic: String, message: String },
}

impl MessagingError {
    /// Create a subscribe error
    pub fn subscribe(
        host: impl Into<String>,
        topic: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Subscribe {
            host: host.into(),
            topic: topic.into(),
            message: message.into(),
        }
    }

    /// Create a poll error
    pub fn poll(topic: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Poll {
            topic: topic.into(),
            message: message.into(),
        }
    }

    /// Create a decode error
    pub fn decode(topic: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            topic: topic.into(),
            message: message.into(),
        }
    }

    /// Topic the error was observed on
    pub fn topic(&self) -> &str {
        match self {
            Self::Subscribe { topic, .. } | Self::Poll { topic, .. } | Self::Decode { topic, .. } => {
                topic
            }
        }
    }
}
