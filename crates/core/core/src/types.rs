//! Core data types for the outbox relay.
//!
//! This module defines the upstream `OutboxEventRecord`, the category
//! payload shapes it carries, and the commands the relay publishes for them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::error::{RelayError, RelayResult};

/// Delivery status of an outbox record, as tracked upstream.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutboxStatus {
    /// Waiting to be published.
    Pending,
    /// Published to the bus.
    Sent,
    /// Publishing was given up on.
    Failed,
}

impl OutboxStatus {
    /// Returns the wire representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Sent => "SENT",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for OutboxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event categories the relay polls for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EventCategory {
    /// User-to-user message delivery events.
    Message,
    /// Request/response log events.
    Log,
}

impl EventCategory {
    /// All categories, in scheduling order.
    pub const ALL: [EventCategory; 2] = [EventCategory::Message, EventCategory::Log];

    /// Short name used in logs and worker names.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::Log => "log",
        }
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A pending event as returned by the upstream outbox service.
///
/// The record is owned upstream; the relay only reads it and asks for
/// status transitions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OutboxEventRecord {
    /// Opaque event identifier.
    pub event_id: String,
    /// Category tag (e.g. `HOBOM_MESSAGE`).
    pub event_type: String,
    /// Current status.
    #[serde(default = "default_status")]
    pub status: OutboxStatus,
    /// Category-specific payload, decoded lazily by the pollers.
    #[serde(default)]
    pub payload: Value,
}

fn default_status() -> OutboxStatus {
    OutboxStatus::Pending
}

impl OutboxEventRecord {
    /// Creates a pending record.
    pub fn pending(
        event_id: impl Into<String>,
        event_type: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            event_type: event_type.into(),
            status: OutboxStatus::Pending,
            payload,
        }
    }

    /// Decodes the payload into a category payload shape.
    ///
    /// A payload that does not fit the shape is a transform error.
    pub fn decode_payload<T: for<'de> Deserialize<'de>>(&self) -> RelayResult<T> {
        serde_json::from_value(self.payload.clone())
            .map_err(|e| RelayError::transform(&self.event_id, e.to_string()))
    }
}

/// Payload of a message-category outbox record.
///
/// Absent fields decode as empty strings; only a payload that is not an
/// object fails to decode.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub recipient: String,
    #[serde(default)]
    pub sender_id: Option<String>,
}

/// Payload of a log-category outbox record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LogPayload {
    pub service_type: String,
    pub level: String,
    pub trace_id: String,
    pub message: String,
    #[serde(alias = "method")]
    pub http_method: String,
    #[serde(default)]
    pub path: Option<String>,
    pub status_code: i32,
    pub host: String,
    pub user_id: String,
    /// Freeform structured data attached to the log line.
    #[serde(default)]
    pub payload: Map<String, Value>,
}

/// Kind tag carried by every delivered message command.
pub const MAIL_MESSAGE_TYPE: &str = "MAIL_MESSAGE";

/// Command published for a message-category event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeliverMessageCommand {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub body: String,
    pub recipient: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<String>,
    pub sent_at: DateTime<Utc>,
}

impl DeliverMessageCommand {
    /// Builds the delivery command for a payload, stamped with the current time.
    pub fn from_payload(payload: MessagePayload) -> Self {
        Self {
            kind: MAIL_MESSAGE_TYPE.to_string(),
            title: payload.title,
            body: payload.body,
            recipient: payload.recipient,
            sender_id: payload.sender_id,
            sent_at: Utc::now(),
        }
    }
}

/// Command published (in batches) for a log-category event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LogMessageCommand {
    pub service_type: String,
    pub level: String,
    pub trace_id: String,
    pub message: String,
    pub http_method: String,
    pub path: Option<String>,
    pub status_code: i32,
    pub host: String,
    pub user_id: String,
    pub payload: Map<String, Value>,
}

impl From<LogPayload> for LogMessageCommand {
    fn from(payload: LogPayload) -> Self {
        Self {
            service_type: payload.service_type,
            level: payload.level,
            trace_id: payload.trace_id,
            message: payload.message,
            http_method: payload.http_method,
            path: payload.path,
            status_code: payload.status_code,
            host: payload.host,
            user_id: payload.user_id,
            payload: payload.payload,
        }
    }
}
