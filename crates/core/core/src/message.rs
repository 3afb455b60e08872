//! Messages handed to the bus.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Header naming the payload encoding.
pub const CONTENT_TYPE_HEADER: &str = "Content-Type";

/// Content type of every payload the relay produces.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// A single message ready for the bus.
///
/// Built fresh for every publish and never mutated afterwards; builders
/// consume and return `self`.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishableMessage {
    /// Partitioning key.
    pub key: String,
    /// Serialized command bytes.
    pub value: Vec<u8>,
    /// Destination topic.
    pub topic: String,
    /// Time the message was built.
    pub timestamp: DateTime<Utc>,
    /// Optional headers.
    pub headers: HashMap<String, String>,
}

impl PublishableMessage {
    /// Creates a message stamped with the current time.
    pub fn new(key: impl Into<String>, value: Vec<u8>, topic: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value,
            topic: topic.into(),
            timestamp: Utc::now(),
            headers: HashMap::new(),
        }
    }

    /// Creates a message whose value is a JSON document.
    pub fn json(key: impl Into<String>, value: Vec<u8>, topic: impl Into<String>) -> Self {
        Self::new(key, value, topic).with_header(CONTENT_TYPE_HEADER, JSON_CONTENT_TYPE)
    }

    /// Adds a header.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
}
