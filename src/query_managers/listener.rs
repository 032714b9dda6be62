//! # Alert Listener
//!
//! Bounded polling of pub/sub topics. Each topic gets at most
//! `alerts_per_topic` polls of up to `poll_timeout` each; an empty poll means
//! the topic is drained for now and ends that topic early.

use crate::config::KafkaConfig;
use crate::messaging::{AlertSource, MessagingError};
use crate::models::Alert;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct AlertListener {
    broker: String,
    source: Option<Arc<dyn AlertSource>>,
    kafka: Option<KafkaConfig>,
}

impl std::fmt::Debug for AlertListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertListener")
            .field("broker", &self.broker)
            .field("enabled", &self.is_enabled())
            .field("kafka", &self.kafka)
            .finish()
    }
}

impl AlertListener {
    pub fn new(
        broker: impl Into<String>,
        source: Option<Arc<dyn AlertSource>>,
        kafka: Option<KafkaConfig>,
    ) -> Self {
        Self {
            broker: broker.into(),
            source,
            kafka,
        }
    }

    /// Listening needs both a pub/sub client and its connection settings
    pub fn is_enabled(&self) -> bool {
        self.source.is_some() && self.kafka.is_some()
    }

    /// Poll every configured topic
    pub async fn listen(&self) -> Vec<Alert> {
        let Some(kafka) = self.kafka.as_ref() else {
            debug!(broker = %self.broker, "No kafka config; not listening for alerts");
            return Vec::new();
        };
        self.listen_topics(&kafka.topics, kafka.alerts_per_topic, kafka.poll_timeout())
            .await
    }

    pub async fn listen_topics(
        &self,
        topics: &[String],
        alerts_per_topic: usize,
        poll_timeout: Duration,
    ) -> Vec<Alert> {
        let (Some(source), Some(kafka)) = (self.source.as_ref(), self.kafka.as_ref()) else {
            warn!(broker = %self.broker, "No pub/sub client configured; not listening for alerts");
            return Vec::new();
        };

        let mut alerts = Vec::new();
        for topic in topics {
            let mut consumer = match source.subscribe(&kafka.host, &kafka.group_id, topic).await {
                Ok(consumer) => consumer,
                Err(e) => {
                    warn!(broker = %self.broker, topic = %topic, error = %e, "Could not subscribe to topic");
                    continue;
                }
            };

            let mut received = 0usize;
            for _ in 0..alerts_per_topic {
                let payload = match consumer.poll(poll_timeout).await {
                    None => break,
                    Some(Ok(payload)) => payload,
                    Some(Err(e)) => {
                        warn!(broker = %self.broker, topic = %topic, error = %e, "Poll error; message skipped");
                        continue;
                    }
                };

                match Alert::from_slice(&payload) {
                    Ok(mut alert) => {
                        alert.set_topic(topic.as_str());
                        alerts.push(alert);
                        received += 1;
                    }
                    Err(e) => {
                        let error = MessagingError::decode(topic.as_str(), e.to_string());
                        warn!(broker = %self.broker, error = %error, "Undecodable alert skipped");
                    }
                }
            }

            info!(broker = %self.broker, topic = %topic, received = received, "Alerts received");
        }
        alerts
    }
}
