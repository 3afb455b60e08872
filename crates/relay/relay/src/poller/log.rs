use async_trait::async_trait;
use uuid::Uuid;

use outbox_relay_core::dead_letter::DeadLetterKey;
use outbox_relay_core::error::RelayError;
use outbox_relay_core::message::PublishableMessage;
use outbox_relay_core::types::{EventCategory, LogMessageCommand, LogPayload, OutboxEventRecord};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::{Poller, PollerContext};

/// One transformed log event awaiting the batch publish.
struct BatchItem {
    event_id: String,
    command: LogMessageCommand,
    /// Single-element array stored as the dead-letter payload.
    dead_letter: Vec<u8>,
}

/// Publishes all pending log events of a cycle as one JSON array.
pub struct LogPoller {
    ctx: PollerContext,
}

impl LogPoller {
    /// Creates a log poller.
    pub fn new(ctx: PollerContext) -> Self {
        Self { ctx }
    }

    async fn transform(&self, record: OutboxEventRecord) -> Option<BatchItem> {
        let command = match record.decode_payload::<LogPayload>() {
            Ok(payload) => LogMessageCommand::from(payload),
            Err(err) => {
                warn!(event_id = %record.event_id, error = %err, "Failed to transform log event");
                self.ctx.mark_failed(&record.event_id, &err.to_string()).await;
                return None;
            }
        };

        match serde_json::to_vec(&[&command]) {
            Ok(dead_letter) => Some(BatchItem {
                event_id: record.event_id,
                command,
                dead_letter,
            }),
            Err(err) => {
                let err = RelayError::transform(&record.event_id, err.to_string());
                warn!(event_id = %record.event_id, error = %err, "Failed to serialize log event");
                self.ctx.mark_failed(&record.event_id, &err.to_string()).await;
                None
            }
        }
    }
}

#[async_trait]
impl Poller for LogPoller {
    fn name(&self) -> &'static str {
        EventCategory::Log.name()
    }

    async fn poll(&self, cancel: &CancellationToken) {
        let Some(records) = self.ctx.fetch_pending(EventCategory::Log).await else {
            return;
        };

        let mut batch = Vec::with_capacity(records.len());
        for record in records {
            if let Some(item) = self.transform(record).await {
                batch.push(item);
            }
        }
        if batch.is_empty() {
            return;
        }

        let commands: Vec<&LogMessageCommand> = batch.iter().map(|item| &item.command).collect();
        let value = match serde_json::to_vec(&commands) {
            Ok(value) => value,
            Err(err) => {
                error!(count = batch.len(), error = %err, "Failed to serialize log batch");
                let reason = RelayError::from(err).to_string();
                for item in &batch {
                    self.ctx.mark_failed(&item.event_id, &reason).await;
                }
                return;
            }
        };

        let key = format!("log-batch-{}", Uuid::new_v4());
        let message = PublishableMessage::json(key, value, &self.ctx.config.log.topic);

        match self.ctx.publisher.publish(cancel, &message).await {
            Ok(()) => {
                info!(key = %message.key, count = batch.len(), "Published log batch");
                for item in &batch {
                    self.ctx.mark_sent(&item.event_id).await;
                }
            }
            Err(RelayError::Cancelled) => {
                info!(count = batch.len(), "Log batch publish cancelled, events left pending");
            }
            Err(err) => {
                let reason = err.to_string();
                for item in &batch {
                    self.ctx.mark_failed(&item.event_id, &reason).await;
                    let key = DeadLetterKey::new(EventCategory::Log, item.event_id.as_str());
                    self.ctx.save_dead_letter(&key, &item.dead_letter).await;
                }
            }
        }
    }
}
