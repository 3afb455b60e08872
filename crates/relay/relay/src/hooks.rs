//! Publish hooks.
//!
//! Hooks observe every attempt made against the bus. `HookedPublisher` runs a
//! chain of them around any `MessagePublisher`, so they see retries too when
//! wrapped by a `RetryingPublisher`.

use async_trait::async_trait;
use std::sync::Arc;

use outbox_relay_core::error::{RelayError, RelayResult};
use outbox_relay_core::message::PublishableMessage;
use outbox_relay_core::traits::{MessagePublisher, PublishHook};

/// A publisher that runs hooks before and after each publish.
pub struct HookedPublisher {
    inner: Arc<dyn MessagePublisher>,
    hooks: Vec<Arc<dyn PublishHook>>,
}

impl HookedPublisher {
    /// Creates a publisher with no hooks.
    pub fn new(inner: Arc<dyn MessagePublisher>) -> Self {
        Self {
            inner,
            hooks: Vec::new(),
        }
    }

    /// Adds a hook to the chain.
    pub fn with_hook(mut self, hook: impl PublishHook + 'static) -> Self {
        self.hooks.push(Arc::new(hook));
        self
    }

    /// Returns the number of hooks in the chain.
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Checks if the chain is empty.
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

#[async_trait]
impl MessagePublisher for HookedPublisher {
    async fn publish(&self, message: &PublishableMessage) -> RelayResult<()> {
        for hook in &self.hooks {
            hook.before_publish(message).await;
        }

        let result = self.inner.publish(message).await;

        for hook in &self.hooks {
            hook.after_publish(message, result.as_ref().copied()).await;
        }

        result
    }

    async fn close(&self) -> RelayResult<()> {
        self.inner.close().await
    }
}

/// Hook that logs every publish attempt.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingPublishHook;

impl LoggingPublishHook {
    /// Creates a new logging hook.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PublishHook for LoggingPublishHook {
    async fn before_publish(&self, message: &PublishableMessage) {
        tracing::debug!(
            topic = %message.topic,
            key = %message.key,
            bytes = message.value.len(),
            "Publishing message"
        );
    }

    async fn after_publish(&self, message: &PublishableMessage, result: Result<(), &RelayError>) {
        match result {
            Ok(()) => {
                tracing::info!(topic = %message.topic, key = %message.key, "Message published");
            }
            Err(err) => {
                tracing::warn!(
                    topic = %message.topic,
                    key = %message.key,
                    error = %err,
                    "Message publish failed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use outbox_relay_memory::RecordingPublisher;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingHook {
        before: Arc<AtomicUsize>,
        failures: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl PublishHook for CountingHook {
        async fn before_publish(&self, _message: &PublishableMessage) {
            self.before.fetch_add(1, Ordering::SeqCst);
        }

        async fn after_publish(&self, _message: &PublishableMessage, result: Result<(), &RelayError>) {
            if result.is_err() {
                self.failures.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[tokio::test]
    async fn test_hooks_observe_each_publish() {
        let inner = RecordingPublisher::new().failing_first(1);
        let hook = CountingHook::default();
        let before = hook.before.clone();
        let failures = hook.failures.clone();

        let publisher = HookedPublisher::new(Arc::new(inner.clone()))
            .with_hook(LoggingPublishHook::new())
            .with_hook(hook);
        let message = PublishableMessage::new("k", b"{}".to_vec(), "hobom.logs");

        assert!(publisher.publish(&message).await.is_err());
        assert!(publisher.publish(&message).await.is_ok());

        assert_eq!(publisher.len(), 2);
        assert_eq!(before.load(Ordering::SeqCst), 2);
        assert_eq!(failures.load(Ordering::SeqCst), 1);
        assert_eq!(inner.published().await.len(), 1);
    }

    #[tokio::test]
    async fn test_close_reaches_inner() {
        let inner = RecordingPublisher::new();
        let publisher = HookedPublisher::new(Arc::new(inner.clone()));

        publisher.close().await.unwrap();
        assert!(inner.is_closed());
    }
}
