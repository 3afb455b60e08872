use async_trait::async_trait;
use outbox_relay_core::error::{RelayError, RelayResult};
use outbox_relay_core::message::PublishableMessage;
use outbox_relay_core::traits::MessagePublisher;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Publisher double that records every attempt.
///
/// Failures are scripted: the first `n` attempts, every attempt, or every
/// attempt for particular message keys. Attempt instants come from the tokio
/// clock, so backoff can be asserted under paused time.
#[derive(Debug, Clone, Default)]
pub struct RecordingPublisher {
    attempts: Arc<RwLock<Vec<(PublishableMessage, Instant)>>>,
    published: Arc<RwLock<Vec<PublishableMessage>>>,
    fail_remaining: Arc<AtomicU32>,
    fail_always: Arc<AtomicBool>,
    failing_keys: Arc<RwLock<HashSet<String>>>,
    closed: Arc<AtomicBool>,
}

impl RecordingPublisher {
    /// Creates a publisher that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the next `n` attempts.
    pub fn failing_first(self, n: u32) -> Self {
        self.fail_remaining.store(n, Ordering::SeqCst);
        self
    }

    /// Fails every attempt.
    pub fn failing_always(self) -> Self {
        self.set_fail_always(true);
        self
    }

    /// Toggles failing every attempt.
    pub fn set_fail_always(&self, fail: bool) {
        self.fail_always.store(fail, Ordering::SeqCst);
    }

    /// Fails every attempt for messages with this key.
    pub async fn fail_key(&self, key: impl Into<String>) {
        self.failing_keys.write().await.insert(key.into());
    }

    /// Returns every attempted message, successful or not.
    pub async fn attempts(&self) -> Vec<PublishableMessage> {
        self.attempts
            .read()
            .await
            .iter()
            .map(|(message, _)| message.clone())
            .collect()
    }

    /// Returns the instant of every attempt.
    pub async fn attempt_instants(&self) -> Vec<Instant> {
        self.attempts.read().await.iter().map(|(_, at)| *at).collect()
    }

    /// Returns the number of attempts so far.
    pub async fn attempt_count(&self) -> usize {
        self.attempts.read().await.len()
    }

    /// Returns the messages that were accepted.
    pub async fn published(&self) -> Vec<PublishableMessage> {
        self.published.read().await.clone()
    }

    /// Returns true once `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn should_fail(&self, message: &PublishableMessage) -> bool {
        if self.fail_always.load(Ordering::SeqCst) {
            return true;
        }
        if self.failing_keys.read().await.contains(&message.key) {
            return true;
        }

        self.fail_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl MessagePublisher for RecordingPublisher {
    async fn publish(&self, message: &PublishableMessage) -> RelayResult<()> {
        self.attempts
            .write()
            .await
            .push((message.clone(), Instant::now()));

        if self.should_fail(message).await {
            return Err(RelayError::publish(&message.topic, "injected publish failure"));
        }

        self.published.write().await.push(message.clone());
        Ok(())
    }

    async fn close(&self) -> RelayResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
