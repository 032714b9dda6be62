//! # In-Process Alert Bus
//!
//! [`ChannelAlertSource`] is an [`AlertSource`] backed by tokio channels,
//! one unbounded queue per topic. Every subscriber of a topic shares that
//! queue, which matches a single consumer group. It lets alerts produced
//! inside the process (or replayed from disk) flow through the same listener
//! as a network broker.

use super::consumer::{AlertConsumer, AlertSource};
use super::errors::MessagingError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::debug;

type QueueItem = Result<Vec<u8>, String>;

#[derive(Clone)]
struct TopicQueue {
    sender: UnboundedSender<QueueItem>,
    receiver: Arc<tokio::sync::Mutex<UnboundedReceiver<QueueItem>>>,
}

impl TopicQueue {
    fn new() -> Self {
        let (sender, receiver) = unbounded_channel();
        Self {
            sender,
            receiver: Arc::new(tokio::sync::Mutex::new(receiver)),
        }
    }
}

#[derive(Clone, Default)]
pub struct ChannelAlertSource {
    topics: Arc<Mutex<HashMap<String, TopicQueue>>>,
}

impl std::fmt::Debug for ChannelAlertSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelAlertSource")
            .field("topics", &self.topics.lock().keys().cloned().collect::<Vec<_>>())
            .finish()
    }
}

impl ChannelAlertSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn queue(&self, topic: &str) -> TopicQueue {
        self.topics
            .lock()
            .entry(topic.to_string())
            .or_insert_with(TopicQueue::new)
            .clone()
    }

    /// Publish a raw payload to `topic`
    pub fn publish(&self, topic: &str, payload: impl Into<Vec<u8>>) {
        // The queue holds its own receiver, so the send cannot fail.
        let _ = self.queue(topic).sender.send(Ok(payload.into()));
    }

    /// Publish a JSON value to `topic`
    pub fn publish_json(&self, topic: &str, payload: &serde_json::Value) {
        self.publish(topic, payload.to_string());
    }

    /// Enqueue a delivery failure; the consumer reports it as a poll error
    pub fn publish_error(&self, topic: &str, message: impl Into<String>) {
        let _ = self.queue(topic).sender.send(Err(message.into()));
    }
}

#[async_trait]
impl AlertSource for ChannelAlertSource {
    async fn subscribe(
        &self,
        host: &str,
        group_id: &str,
        topic: &str,
    ) -> Result<Box<dyn AlertConsumer>, MessagingError> {
        debug!(host = host, group_id = group_id, topic = topic, "Subscribing channel consumer");
        Ok(Box::new(ChannelConsumer {
            topic: topic.to_string(),
            receiver: self.queue(topic).receiver,
        }))
    }
}

struct ChannelConsumer {
    topic: String,
    receiver: Arc<tokio::sync::Mutex<UnboundedReceiver<QueueItem>>>,
}

#[async_trait]
impl AlertConsumer for ChannelConsumer {
    async fn poll(&mut self, timeout: Duration) -> Option<Result<Vec<u8>, MessagingError>> {
        let mut receiver = self.receiver.lock().await;
        match tokio::time::timeout(timeout, receiver.recv()).await {
            Ok(Some(Ok(payload))) => Some(Ok(payload)),
            Ok(Some(Err(message))) => Some(Err(MessagingError::poll(self.topic.clone(), message))),
            Ok(None) | Err(_) => None,
        }
    }
}
