use async_trait::async_trait;
use outbox_relay_core::error::{RelayError, RelayResult};
use outbox_relay_core::traits::OutboxClient;
use outbox_relay_core::types::{OutboxEventRecord, OutboxStatus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// A status update received by the in-memory outbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkCall {
    Sent { event_id: String },
    Failed { event_id: String, reason: String },
}

impl MarkCall {
    /// Returns the event id the call was made for.
    pub fn event_id(&self) -> &str {
        match self {
            Self::Sent { event_id } | Self::Failed { event_id, .. } => event_id,
        }
    }
}

/// In-memory upstream outbox.
///
/// Records keep their insertion order, status updates are applied to the
/// stored records, and every mark call is recorded, including ones that
/// were made to fail.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOutboxClient {
    records: Arc<RwLock<Vec<OutboxEventRecord>>>,
    calls: Arc<RwLock<Vec<MarkCall>>>,
    fail_fetch: Arc<AtomicBool>,
    fail_mark_sent: Arc<AtomicBool>,
    fail_mark_failed: Arc<AtomicBool>,
}

impl InMemoryOutboxClient {
    /// Creates an empty outbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an outbox holding the given records.
    pub fn with_records(records: Vec<OutboxEventRecord>) -> Self {
        Self {
            records: Arc::new(RwLock::new(records)),
            ..Self::default()
        }
    }

    /// Appends a record.
    pub async fn insert(&self, record: OutboxEventRecord) {
        self.records.write().await.push(record);
    }

    /// Returns the current status of a record.
    pub async fn status_of(&self, event_id: &str) -> Option<OutboxStatus> {
        self.records
            .read()
            .await
            .iter()
            .find(|r| r.event_id == event_id)
            .map(|r| r.status)
    }

    /// Returns every mark call received so far.
    pub async fn calls(&self) -> Vec<MarkCall> {
        self.calls.read().await.clone()
    }

    /// Returns the event ids mark-sent was called for, in call order.
    pub async fn sent_ids(&self) -> Vec<String> {
        self.calls
            .read()
            .await
            .iter()
            .filter_map(|call| match call {
                MarkCall::Sent { event_id } => Some(event_id.clone()),
                MarkCall::Failed { .. } => None,
            })
            .collect()
    }

    /// Returns `(event_id, reason)` for every mark-failed call.
    pub async fn failed_calls(&self) -> Vec<(String, String)> {
        self.calls
            .read()
            .await
            .iter()
            .filter_map(|call| match call {
                MarkCall::Failed { event_id, reason } => Some((event_id.clone(), reason.clone())),
                MarkCall::Sent { .. } => None,
            })
            .collect()
    }

    /// Makes fetches fail.
    pub fn set_fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    /// Makes mark-sent calls fail.
    pub fn set_fail_mark_sent(&self, fail: bool) {
        self.fail_mark_sent.store(fail, Ordering::SeqCst);
    }

    /// Makes mark-failed calls fail.
    pub fn set_fail_mark_failed(&self, fail: bool) {
        self.fail_mark_failed.store(fail, Ordering::SeqCst);
    }

    async fn transition(&self, event_id: &str, status: OutboxStatus) {
        let mut records = self.records.write().await;
        if let Some(record) = records.iter_mut().find(|r| r.event_id == event_id) {
            record.status = status;
        }
    }
}

#[async_trait]
impl OutboxClient for InMemoryOutboxClient {
    async fn find_by_category_and_status(
        &self,
        event_type: &str,
        status: OutboxStatus,
    ) -> RelayResult<Vec<OutboxEventRecord>> {
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(RelayError::outbox_rpc("find", "injected fetch failure"));
        }

        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|r| r.event_type == event_type && r.status == status)
            .cloned()
            .collect())
    }

    async fn mark_sent(&self, event_id: &str) -> RelayResult<()> {
        self.calls.write().await.push(MarkCall::Sent {
            event_id: event_id.to_string(),
        });

        if self.fail_mark_sent.load(Ordering::SeqCst) {
            return Err(RelayError::outbox_rpc("mark_sent", "injected failure"));
        }

        self.transition(event_id, OutboxStatus::Sent).await;
        Ok(())
    }

    async fn mark_failed(&self, event_id: &str, reason: &str) -> RelayResult<()> {
        self.calls.write().await.push(MarkCall::Failed {
            event_id: event_id.to_string(),
            reason: reason.to_string(),
        });

        if self.fail_mark_failed.load(Ordering::SeqCst) {
            return Err(RelayError::outbox_rpc("mark_failed", "injected failure"));
        }

        self.transition(event_id, OutboxStatus::Failed).await;
        Ok(())
    }
}
