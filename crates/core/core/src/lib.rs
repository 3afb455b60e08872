//! # Outbox Relay Core
//!
//! This crate provides the foundational types and traits for the outbox
//! relay. It defines the outbox record and command shapes, the dead-letter
//! key format, the relay configuration, the error type, and the trait
//! interfaces that bus, upstream and store adapters must implement.

pub mod config;
pub mod dead_letter;
pub mod error;
pub mod message;
pub mod traits;
pub mod types;

// Re-export commonly used items at the crate root
pub use config::{CategoryRoute, RelayConfig, RetryPolicy, UNKNOWN_TOPIC};
pub use dead_letter::{extract_event_id, DeadLetterKey, KEY_SEPARATOR};
pub use error::{RelayError, RelayResult};
pub use message::{PublishableMessage, CONTENT_TYPE_HEADER, JSON_CONTENT_TYPE};
pub use traits::{DeadLetterStore, MessagePublisher, OutboxClient, PublishHook};
pub use types::{
    DeliverMessageCommand, EventCategory, LogMessageCommand, LogPayload, MessagePayload,
    OutboxEventRecord, OutboxStatus, MAIL_MESSAGE_TYPE,
};
