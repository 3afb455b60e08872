//! Outbox pollers.
//!
//! One poller per event category. Each `poll` runs a single
//! fetch/publish/reconcile cycle; errors are contained to the affected items
//! and logged, never returned. A cycle always runs to completion: only the
//! retry backoff observes cancellation, which leaves the affected records
//! pending.

use async_trait::async_trait;
use std::sync::Arc;

use outbox_relay_core::config::RelayConfig;
use outbox_relay_core::dead_letter::DeadLetterKey;
use outbox_relay_core::traits::{DeadLetterStore, OutboxClient};
use outbox_relay_core::types::{EventCategory, OutboxEventRecord, OutboxStatus};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::retry::RetryingPublisher;

mod log;
mod message;

pub use log::LogPoller;
pub use message::MessagePoller;

/// A unit of periodic work driven by the scheduler.
#[async_trait]
pub trait Poller: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Runs one cycle.
    async fn poll(&self, cancel: &CancellationToken);
}

/// Dependencies shared by every poller.
#[derive(Clone)]
pub struct PollerContext {
    pub config: Arc<RelayConfig>,
    pub outbox: Arc<dyn OutboxClient>,
    pub store: Arc<dyn DeadLetterStore>,
    pub publisher: Arc<RetryingPublisher>,
}

impl PollerContext {
    /// Creates a poller context.
    pub fn new(
        config: Arc<RelayConfig>,
        outbox: Arc<dyn OutboxClient>,
        store: Arc<dyn DeadLetterStore>,
        publisher: Arc<RetryingPublisher>,
    ) -> Self {
        Self {
            config,
            outbox,
            store,
            publisher,
        }
    }

    /// Fetches pending records for a category.
    ///
    /// Returns `None` when the fetch failed; the cycle then ends without side
    /// effects.
    async fn fetch_pending(&self, category: EventCategory) -> Option<Vec<OutboxEventRecord>> {
        let event_type = &self.config.route(category).event_type;

        let result = self
            .outbox
            .find_by_category_and_status(event_type, OutboxStatus::Pending)
            .await;

        match result {
            Ok(records) => {
                if !records.is_empty() {
                    debug!(category = %category, count = records.len(), "Fetched pending events");
                }
                Some(records)
            }
            Err(err) => {
                error!(
                    category = %category,
                    event_type = %event_type,
                    error = %err,
                    "Failed to fetch pending events"
                );
                None
            }
        }
    }

    async fn mark_sent(&self, event_id: &str) {
        if let Err(err) = self.outbox.mark_sent(event_id).await {
            error!(event_id = %event_id, error = %err, "Failed to mark event as sent");
        }
    }

    async fn mark_failed(&self, event_id: &str, reason: &str) {
        if let Err(err) = self.outbox.mark_failed(event_id, reason).await {
            error!(event_id = %event_id, error = %err, "Failed to mark event as failed");
        }
    }

    async fn save_dead_letter(&self, key: &DeadLetterKey, payload: &[u8]) {
        let key = key.render(&self.config);
        match self
            .store
            .save(&key, payload, self.config.dead_letter_ttl)
            .await
        {
            Ok(()) => {
                tracing::warn!(key = %key, "Saved event to dead-letter store");
            }
            Err(err) => {
                error!(key = %key, error = %err, "Failed to save dead-letter entry");
            }
        }
    }
}
