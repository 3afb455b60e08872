use async_trait::async_trait;

use outbox_relay_core::dead_letter::DeadLetterKey;
use outbox_relay_core::error::{RelayError, RelayResult};
use outbox_relay_core::message::PublishableMessage;
use outbox_relay_core::types::{
    DeliverMessageCommand, EventCategory, MessagePayload, OutboxEventRecord,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{Poller, PollerContext};

/// Publishes message-category events one at a time, keyed by event id.
pub struct MessagePoller {
    ctx: PollerContext,
}

impl MessagePoller {
    /// Creates a message poller.
    pub fn new(ctx: PollerContext) -> Self {
        Self { ctx }
    }

    fn transform(record: &OutboxEventRecord) -> RelayResult<Vec<u8>> {
        let payload: MessagePayload = record.decode_payload()?;
        let command = DeliverMessageCommand::from_payload(payload);
        serde_json::to_vec(&command).map_err(|e| RelayError::transform(&record.event_id, e.to_string()))
    }

    async fn deliver(&self, cancel: &CancellationToken, record: OutboxEventRecord) {
        let event_id = record.event_id.as_str();

        let value = match Self::transform(&record) {
            Ok(value) => value,
            Err(err) => {
                warn!(event_id = %event_id, error = %err, "Failed to transform message event");
                self.ctx.mark_failed(event_id, &err.to_string()).await;
                return;
            }
        };

        let message = PublishableMessage::json(event_id, value, &self.ctx.config.message.topic);

        match self.ctx.publisher.publish(cancel, &message).await {
            Ok(()) => {
                self.ctx.mark_sent(event_id).await;
            }
            Err(RelayError::Cancelled) => {
                info!(event_id = %event_id, "Publish cancelled, event left pending");
            }
            Err(err) => {
                self.ctx.mark_failed(event_id, &err.to_string()).await;
                let key = DeadLetterKey::new(EventCategory::Message, event_id);
                self.ctx.save_dead_letter(&key, &message.value).await;
            }
        }
    }
}

#[async_trait]
impl Poller for MessagePoller {
    fn name(&self) -> &'static str {
        EventCategory::Message.name()
    }

    async fn poll(&self, cancel: &CancellationToken) {
        let Some(records) = self.ctx.fetch_pending(EventCategory::Message).await else {
            return;
        };

        for record in records {
            self.deliver(cancel, record).await;
        }
    }
}
