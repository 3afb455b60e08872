//! Error types for the outbox relay.
//!
//! This module defines the `RelayError` enum which represents every failure
//! the relay distinguishes between: payload transforms, bus publishes,
//! upstream status updates and dead-letter store operations.

use thiserror::Error;

/// The main error type for outbox relay operations.
#[derive(Debug, Error)]
pub enum RelayError {
    // ==================== Payload Errors ====================
    /// The raw outbox payload could not be turned into a command.
    #[error("Failed to transform payload for event {event_id}: {reason}")]
    Transform { event_id: String, reason: String },

    /// Serialization/deserialization failed.
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    // ==================== Bus Errors ====================
    /// Publishing to the message bus failed.
    #[error("Failed to publish to '{topic}': {message}")]
    Publish { topic: String, message: String },

    /// The operation was cancelled while waiting between publish attempts.
    #[error("Operation cancelled")]
    Cancelled,

    // ==================== Upstream Errors ====================
    /// A call to the upstream outbox service failed.
    #[error("Outbox RPC '{operation}' failed: {message}")]
    OutboxRpc { operation: String, message: String },

    // ==================== Dead-Letter Errors ====================
    /// No dead-letter entry exists under the key.
    #[error("Dead-letter entry not found: {key}")]
    DeadLetterNotFound { key: String },

    /// The dead-letter key carries no event id after its final separator.
    #[error("Invalid dead-letter key format, cannot extract event id from: {key}")]
    MalformedDeadLetterKey { key: String },

    /// The dead-letter store backend failed.
    #[error("Dead-letter store error: {message}")]
    Store { message: String },

    // ==================== Configuration Errors ====================
    /// The configuration is invalid.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    // ==================== Internal Errors ====================
    /// An internal error occurred.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl RelayError {
    /// Creates a new transform error.
    pub fn transform(event_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Transform {
            event_id: event_id.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new publish error.
    pub fn publish(topic: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Publish {
            topic: topic.into(),
            message: message.into(),
        }
    }

    /// Creates a new upstream RPC error.
    pub fn outbox_rpc(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::OutboxRpc {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Creates a new dead-letter not found error.
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::DeadLetterNotFound { key: key.into() }
    }

    /// Creates a new malformed key error.
    pub fn malformed_key(key: impl Into<String>) -> Self {
        Self::MalformedDeadLetterKey { key: key.into() }
    }

    /// Creates a new store error.
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    /// Creates a new configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns an HTTP status code appropriate for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::DeadLetterNotFound { .. } => 404,
            Self::MalformedDeadLetterKey { .. } | Self::Transform { .. } => 422,
            Self::Cancelled => 503,
            _ => 500,
        }
    }
}

/// A Result type alias using RelayError.
pub type RelayResult<T> = Result<T, RelayError>;

impl From<serde_json::Error> for RelayError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}
