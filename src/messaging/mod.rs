//! # Messaging
//!
//! Pub/sub plumbing for alert ingestion: consumer traits, an in-process
//! channel implementation, the Kafka client (behind the `kafka` feature) and
//! the associated error types.

pub mod channel;
pub mod consumer;
pub mod errors;
#[cfg(feature = "kafka")]
pub mod kafka;

pub use channel::ChannelAlertSource;
pub use consumer::{AlertConsumer, AlertSource};
pub use errors::MessagingError;
#[cfg(feature = "kafka")]
pub use kafka::KafkaAlertSource;

use std::sync::Arc;

/// The network pub/sub client this build ships with, if any
pub fn default_alert_source() -> Option<Arc<dyn AlertSource>> {
    #[cfg(feature = "kafka")]
    {
        Some(Arc::new(KafkaAlertSource::new()))
    }
    #[cfg(not(feature = "kafka"))]
    {
        None
    }
}
