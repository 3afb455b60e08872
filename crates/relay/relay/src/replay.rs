//! Dead-letter replay.
//!
//! Operators list, inspect and republish dead-letter entries. A replayed entry
//! goes back to the topic inferred from its key prefix, the upstream record is
//! marked sent, and the entry is deleted.

use serde::Serialize;
use std::sync::Arc;

use outbox_relay_core::config::RelayConfig;
use outbox_relay_core::dead_letter::extract_event_id;
use outbox_relay_core::error::{RelayError, RelayResult};
use outbox_relay_core::message::PublishableMessage;
use outbox_relay_core::traits::{DeadLetterStore, OutboxClient};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::retry::RetryingPublisher;

/// Outcome of replaying every key under a filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReplaySummary {
    /// Keys that were republished.
    pub retried: Vec<String>,
    /// Keys that could not be replayed.
    pub failed: Vec<ReplayFailure>,
}

/// A key that failed to replay.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayFailure {
    pub key: String,
    pub error: String,
}

/// Lists, inspects and republishes dead-letter entries.
#[derive(Clone)]
pub struct ReplayService {
    config: Arc<RelayConfig>,
    store: Arc<dyn DeadLetterStore>,
    publisher: Arc<RetryingPublisher>,
    outbox: Arc<dyn OutboxClient>,
}

impl ReplayService {
    /// Creates a replay service.
    pub fn new(
        config: Arc<RelayConfig>,
        store: Arc<dyn DeadLetterStore>,
        publisher: Arc<RetryingPublisher>,
        outbox: Arc<dyn OutboxClient>,
    ) -> Self {
        Self {
            config,
            store,
            publisher,
            outbox,
        }
    }

    /// Lists dead-letter keys starting with `filter`.
    ///
    /// An empty or whitespace-only filter lists every entry. Glob characters in
    /// the filter are passed through to the store unescaped.
    pub async fn list_keys(&self, filter: &str) -> RelayResult<Vec<String>> {
        let filter = filter.trim();
        let pattern = if filter.is_empty() {
            self.config.dead_letter_pattern()
        } else {
            format!("{filter}*")
        };

        self.store.list(&pattern).await
    }

    /// Returns the raw payload stored under `key`.
    pub async fn get_value(&self, key: &str) -> RelayResult<Vec<u8>> {
        self.store.get(key).await
    }

    /// Republishes one dead-letter entry.
    ///
    /// The entry is left untouched unless the publish succeeds. The event id
    /// is validated only after the publish, so a malformed key can still have
    /// been republished when `MalformedDeadLetterKey` is returned. Failing to
    /// mark the record sent or to delete the entry is logged, not returned.
    pub async fn retry(&self, cancel: &CancellationToken, key: &str) -> RelayResult<()> {
        let payload = self.store.get(key).await?;
        let topic = self.config.infer_topic(key);
        let message = PublishableMessage::json(key, payload, topic);

        if let Err(err) = self.publisher.publish(cancel, &message).await {
            error!(key = %key, topic = %topic, error = %err, "Failed to republish dead-letter entry");
            return Err(err);
        }

        let event_id = extract_event_id(key);
        if event_id.is_empty() {
            return Err(RelayError::malformed_key(key));
        }

        if let Err(err) = self.outbox.mark_sent(event_id).await {
            warn!(key = %key, event_id = %event_id, error = %err, "Failed to mark replayed event as sent");
        }

        if let Err(err) = self.store.delete(key).await {
            warn!(key = %key, error = %err, "Failed to delete replayed dead-letter entry");
        }

        info!(key = %key, topic = %topic, "Replayed dead-letter entry");
        Ok(())
    }

    /// Replays every key matching `filter`, collecting per-key failures.
    ///
    /// Stops early once `cancel` fires; unvisited keys are left in place.
    pub async fn retry_matching(
        &self,
        cancel: &CancellationToken,
        filter: &str,
    ) -> RelayResult<ReplaySummary> {
        let keys = self.list_keys(filter).await?;
        let mut summary = ReplaySummary::default();

        for key in keys {
            if cancel.is_cancelled() {
                break;
            }

            match self.retry(cancel, &key).await {
                Ok(()) => summary.retried.push(key),
                Err(err) => summary.failed.push(ReplayFailure {
                    key,
                    error: err.to_string(),
                }),
            }
        }

        info!(
            retried = summary.retried.len(),
            failed = summary.failed.len(),
            "Bulk replay finished"
        );
        Ok(summary)
    }
}
