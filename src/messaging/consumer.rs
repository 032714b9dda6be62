//! # Pub/Sub Consumer Seams
//!
//! The listener talks to "some pub/sub client" through these two traits.
//! Offsets and acknowledgement are left to the implementation's defaults, so
//! delivery is at-least-once.

use super::errors::MessagingError;
use async_trait::async_trait;
use std::time::Duration;

/// A consumer bound to one topic
#[async_trait]
pub trait AlertConsumer: Send {
    /// Wait up to `timeout` for the next message.
    ///
    /// `None` means nothing is available right now; `Some(Err(_))` is a
    /// per-message failure and the consumer stays usable.
    async fn poll(&mut self, timeout: Duration) -> Option<Result<Vec<u8>, MessagingError>>;
}

/// Factory for topic-bound consumers
#[async_trait]
pub trait AlertSource: Send + Sync {
    async fn subscribe(
        &self,
        host: &str,
        group_id: &str,
        topic: &str,
    ) -> Result<Box<dyn AlertConsumer>, MessagingError>;
}
