//! # Kafka Alert Source
//!
//! [`KafkaAlertSource`] subscribes one librdkafka consumer per topic. Offsets
//! are committed automatically, and a group with no committed offset starts
//! from the earliest retained alert.

use super::consumer::{AlertConsumer, AlertSource};
use super::errors::MessagingError;
use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct KafkaAlertSource {
    auto_offset_reset: String,
}

impl Default for KafkaAlertSource {
    fn default() -> Self {
        Self {
            auto_offset_reset: "earliest".to_string(),
        }
    }
}

impl KafkaAlertSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Where a group with no committed offset starts reading
    pub fn with_auto_offset_reset(mut self, reset: impl Into<String>) -> Self {
        self.auto_offset_reset = reset.into();
        self
    }

    fn client_config(&self, host: &str, group_id: &str) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", host)
            .set("group.id", group_id)
            .set("enable.auto.commit", "true")
            .set("auto.offset.reset", &self.auto_offset_reset);
        config
    }
}

#[async_trait]
impl AlertSource for KafkaAlertSource {
    async fn subscribe(
        &self,
        host: &str,
        group_id: &str,
        topic: &str,
    ) -> Result<Box<dyn AlertConsumer>, MessagingError> {
        let consumer: StreamConsumer = self
            .client_config(host, group_id)
            .create()
            .map_err(|e| MessagingError::subscribe(host, topic, e.to_string()))?;
        consumer
            .subscribe(&[topic])
            .map_err(|e| MessagingError::subscribe(host, topic, e.to_string()))?;

        debug!(host = host, group_id = group_id, topic = topic, "Subscribed Kafka consumer");
        Ok(Box::new(KafkaAlertConsumer {
            topic: topic.to_string(),
            consumer,
        }))
    }
}

struct KafkaAlertConsumer {
    topic: String,
    consumer: StreamConsumer,
}

/// A message without a payload is reported as a poll error
fn payload_or_error(topic: &str, payload: Option<&[u8]>) -> Result<Vec<u8>, MessagingError> {
    payload
        .map(<[u8]>::to_vec)
        .ok_or_else(|| MessagingError::poll(topic, "message has no payload"))
}

#[async_trait]
impl AlertConsumer for KafkaAlertConsumer {
    async fn poll(&mut self, timeout: Duration) -> Option<Result<Vec<u8>, MessagingError>> {
        match tokio::time::timeout(timeout, self.consumer.recv()).await {
            Ok(Ok(message)) => Some(payload_or_error(&self.topic, message.payload())),
            Ok(Err(e)) => Some(Err(MessagingError::poll(self.topic.clone(), e.to_string()))),
            Err(_) => None,
        }
    }
}
