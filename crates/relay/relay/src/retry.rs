//! Bounded publish retries with cancellable exponential backoff.

use std::sync::Arc;

use outbox_relay_core::config::RetryPolicy;
use outbox_relay_core::error::{RelayError, RelayResult};
use outbox_relay_core::message::PublishableMessage;
use outbox_relay_core::traits::MessagePublisher;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Wraps a publisher with a bounded retry policy.
///
/// The first attempt is always made. Cancellation is only observed while
/// waiting between attempts; an attempt in flight is never preempted.
#[derive(Clone)]
pub struct RetryingPublisher {
    inner: Arc<dyn MessagePublisher>,
    policy: RetryPolicy,
}

impl RetryingPublisher {
    /// Creates a retrying publisher.
    pub fn new(inner: Arc<dyn MessagePublisher>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// Publishes a message, retrying failed attempts.
    ///
    /// Returns the last publish error once every attempt has failed, or
    /// `RelayError::Cancelled` if `cancel` fires during a backoff wait.
    pub async fn publish(
        &self,
        cancel: &CancellationToken,
        message: &PublishableMessage,
    ) -> RelayResult<()> {
        let mut attempt = 1;

        loop {
            let err = match self.inner.publish(message).await {
                Ok(()) => {
                    if attempt > 1 {
                        debug!(
                            topic = %message.topic,
                            key = %message.key,
                            attempt,
                            "Publish succeeded after retry"
                        );
                    }
                    return Ok(());
                }
                Err(err) => err,
            };

            let Some(delay) = self.policy.delay_after(attempt) else {
                error!(
                    topic = %message.topic,
                    key = %message.key,
                    attempts = attempt,
                    error = %err,
                    "Publish failed, retries exhausted"
                );
                return Err(err);
            };

            warn!(
                topic = %message.topic,
                key = %message.key,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Publish failed, retrying"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(key = %message.key, attempt, "Publish retry cancelled");
                    return Err(RelayError::Cancelled);
                }
                _ = tokio::time::sleep(delay) => {}
            }

            attempt += 1;
        }
    }
}
