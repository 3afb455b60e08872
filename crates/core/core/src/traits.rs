//! Collaborator traits for the outbox relay.
//!
//! The relay talks to three external systems: the message bus, the upstream
//! outbox service and the dead-letter store. Each one sits behind a trait so
//! pollers and replay can be driven by in-memory doubles in tests.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::{RelayError, RelayResult};
use crate::message::PublishableMessage;
use crate::types::{OutboxEventRecord, OutboxStatus};

/// Publishes a single message to the bus.
///
/// Implementations are shared by every worker and by replay, so they must be
/// safe for concurrent use without external locking.
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    /// Publishes one message.
    async fn publish(&self, message: &PublishableMessage) -> RelayResult<()>;

    /// Flushes and releases the underlying client.
    async fn close(&self) -> RelayResult<()> {
        Ok(())
    }
}

/// Client for the upstream outbox service.
#[async_trait]
pub trait OutboxClient: Send + Sync {
    /// Returns records of the given event type in the given status.
    async fn find_by_category_and_status(
        &self,
        event_type: &str,
        status: OutboxStatus,
    ) -> RelayResult<Vec<OutboxEventRecord>>;

    /// Marks a record as delivered.
    async fn mark_sent(&self, event_id: &str) -> RelayResult<()>;

    /// Marks a record as failed with a reason.
    async fn mark_failed(&self, event_id: &str, reason: &str) -> RelayResult<()>;
}

/// Key/value store for payloads that could not be delivered.
#[async_trait]
pub trait DeadLetterStore: Send + Sync {
    /// Stores a payload that expires after `ttl`.
    async fn save(&self, key: &str, payload: &[u8], ttl: Duration) -> RelayResult<()>;

    /// Returns the payload under `key`, or `DeadLetterNotFound`.
    async fn get(&self, key: &str) -> RelayResult<Vec<u8>>;

    /// Removes the entry; removing an absent key succeeds.
    async fn delete(&self, key: &str) -> RelayResult<()>;

    /// Returns every key matching the glob pattern.
    async fn list(&self, pattern: &str) -> RelayResult<Vec<String>>;
}

/// Extension point around every bus publish.
#[async_trait]
pub trait PublishHook: Send + Sync {
    /// Called before a publish attempt.
    async fn before_publish(&self, _message: &PublishableMessage) {}

    /// Called after a publish attempt with its outcome.
    async fn after_publish(
        &self,
        _message: &PublishableMessage,
        _result: Result<(), &RelayError>,
    ) {
    }
}
