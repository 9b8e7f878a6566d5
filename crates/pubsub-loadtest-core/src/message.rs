//! Outgoing messages and publish outcomes

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A message ready to be published. The payload is opaque bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub data: Vec<u8>,
    pub attributes: HashMap<String, String>,
    pub ordering_key: Option<String>,
}

impl OutgoingMessage {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            ..Default::default()
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Merge attributes; keys already on the message are kept
    pub fn with_default_attributes(mut self, attributes: &HashMap<String, String>) -> Self {
        for (key, value) in attributes {
            self.attributes
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
        self
    }

    pub fn with_ordering_key(mut self, key: impl Into<String>) -> Self {
        self.ordering_key = Some(key.into());
        self
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl From<&str> for OutgoingMessage {
    fn from(value: &str) -> Self {
        Self::new(value.as_bytes().to_vec())
    }
}

impl From<String> for OutgoingMessage {
    fn from(value: String) -> Self {
        Self::new(value.into_bytes())
    }
}

impl From<Vec<u8>> for OutgoingMessage {
    fn from(value: Vec<u8>) -> Self {
        Self::new(value)
    }
}

impl From<&[u8]> for OutgoingMessage {
    fn from(value: &[u8]) -> Self {
        Self::new(value.to_vec())
    }
}

/// What the caller learns about a publish
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PublishOutcome {
    /// The broker accepted the message and assigned it an id
    Acknowledged { message_id: String },
    /// The message was handed off without waiting for the broker
    Enqueued,
}

impl PublishOutcome {
    pub fn message_id(&self) -> Option<&str> {
        match self {
            PublishOutcome::Acknowledged { message_id } => Some(message_id),
            PublishOutcome::Enqueued => None,
        }
    }

    pub fn is_acknowledged(&self) -> bool {
        matches!(self, PublishOutcome::Acknowledged { .. })
    }
}
