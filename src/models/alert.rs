//! # Alert
//!
//! A pub/sub alert is an open JSON object. The only required field is
//! `objectId`; the manager adds `topic` when the alert is received and
//! `alert_timestamp` when it is processed.

use crate::utils::serde::value_as_i64;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const OBJECT_ID_FIELD: &str = "objectId";
pub const TOPIC_FIELD: &str = "topic";
pub const ALERT_TIMESTAMP_FIELD: &str = "alert_timestamp";

/// Candidate identifier keys, in lookup order
pub const CANDIDATE_ID_FIELDS: [&str; 2] = ["candid", "candidateId"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Alert(Map<String, Value>);

impl Alert {
    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Decode a raw payload; anything other than a JSON object is rejected
    pub fn from_slice(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice::<Map<String, Value>>(payload).map(Self)
    }

    pub fn object_id(&self) -> Option<&str> {
        self.0.get(OBJECT_ID_FIELD).and_then(Value::as_str)
    }

    /// Candidate identifier as a string key, if the alert carries one
    pub fn candidate_id(&self) -> Option<String> {
        CANDIDATE_ID_FIELDS.iter().find_map(|field| {
            let value = self.0.get(*field)?;
            match value {
                Value::String(s) if !s.is_empty() => Some(s.clone()),
                other => value_as_i64(other).map(|id| id.to_string()),
            }
        })
    }

    pub fn topic(&self) -> Option<&str> {
        self.0.get(TOPIC_FIELD).and_then(Value::as_str)
    }

    pub fn set_topic(&mut self, topic: impl Into<String>) {
        self.0.insert(TOPIC_FIELD.to_string(), Value::String(topic.into()));
    }

    pub fn alert_timestamp(&self) -> Option<&str> {
        self.0.get(ALERT_TIMESTAMP_FIELD).and_then(Value::as_str)
    }

    pub fn set_alert_timestamp(&mut self, timestamp: impl Into<String>) {
        self.0.insert(
            ALERT_TIMESTAMP_FIELD.to_string(),
            Value::String(timestamp.into()),
        );
    }

    /// Field lookup; JSON `null` is reported as absent
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field).filter(|v| !v.is_null())
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Value) {
        self.0.insert(field.into(), value);
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for Alert {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}
