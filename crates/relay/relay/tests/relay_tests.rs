//! End-to-end tests for the outbox relay
//!
//! This test suite covers:
//! - Message and log delivery scenarios
//! - Dead-letter replay scenarios
//! - Key listing, topic inference and event id extraction
//! - Scheduled runs and shutdown

use std::sync::Arc;
use std::time::Duration;

use outbox_relay::{
    CancellationToken, PollerContext, Poller, LogPoller, MessagePoller, ReplayService,
    RetryingPublisher, Scheduler,
};
use async_trait::async_trait;
use outbox_relay_core::{
    extract_event_id, DeadLetterStore, MessagePublisher, OutboxClient, OutboxEventRecord,
    OutboxStatus, PublishableMessage, RelayConfig, RelayError, RelayResult,
};
use outbox_relay_memory::{InMemoryDeadLetterStore, InMemoryOutboxClient, MarkCall, RecordingPublisher};
use serde_json::{json, Value};
use tokio::sync::Mutex;

const TTL: Duration = Duration::from_secs(72 * 60 * 60);

struct Harness {
    config: Arc<RelayConfig>,
    outbox: InMemoryOutboxClient,
    store: InMemoryDeadLetterStore,
    publisher: RecordingPublisher,
    ctx: PollerContext,
    replay: ReplayService,
}

impl Harness {
    fn new(publisher: RecordingPublisher) -> Self {
        Self::with_config(RelayConfig::default(), publisher)
    }

    fn with_config(config: RelayConfig, publisher: RecordingPublisher) -> Self {
        let config = Arc::new(config);
        let outbox = InMemoryOutboxClient::new();
        let store = InMemoryDeadLetterStore::new();
        let retrying = Arc::new(RetryingPublisher::new(
            Arc::new(publisher.clone()),
            config.retry.clone(),
        ));

        let ctx = PollerContext::new(
            config.clone(),
            Arc::new(outbox.clone()),
            Arc::new(store.clone()),
            retrying.clone(),
        );
        let replay = ReplayService::new(
            config.clone(),
            Arc::new(store.clone()),
            retrying,
            Arc::new(outbox.clone()),
        );

        Self {
            config,
            outbox,
            store,
            publisher,
            ctx,
            replay,
        }
    }
}

fn log_record(id: &str) -> OutboxEventRecord {
    OutboxEventRecord::pending(
        id,
        "HOBOM_LOG",
        json!({
            "serviceType": "hobom-backend",
            "level": "ERROR",
            "traceId": format!("trace-{id}"),
            "message": "upstream timeout",
            "httpMethod": "POST",
            "statusCode": 504,
            "host": "api-1",
            "userId": "u42"
        }),
    )
}

/// Call log shared by the journaled doubles, in call order.
#[derive(Clone, Default)]
struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    async fn push(&self, entry: String) {
        self.0.lock().await.push(entry);
    }

    async fn entries(&self) -> Vec<String> {
        self.0.lock().await.clone()
    }
}

struct JournaledPublisher {
    inner: RecordingPublisher,
    journal: Journal,
}

#[async_trait]
impl MessagePublisher for JournaledPublisher {
    async fn publish(&self, message: &PublishableMessage) -> RelayResult<()> {
        let result = self.inner.publish(message).await;
        if result.is_ok() {
            self.journal.push(format!("publish:{}", message.key)).await;
        }
        result
    }
}

struct JournaledOutbox {
    inner: InMemoryOutboxClient,
    journal: Journal,
}

#[async_trait]
impl OutboxClient for JournaledOutbox {
    async fn find_by_category_and_status(
        &self,
        event_type: &str,
        status: OutboxStatus,
    ) -> RelayResult<Vec<OutboxEventRecord>> {
        self.inner.find_by_category_and_status(event_type, status).await
    }

    async fn mark_sent(&self, event_id: &str) -> RelayResult<()> {
        self.journal.push(format!("sent:{event_id}")).await;
        self.inner.mark_sent(event_id).await
    }

    async fn mark_failed(&self, event_id: &str, reason: &str) -> RelayResult<()> {
        self.journal.push(format!("failed:{event_id}")).await;
        self.inner.mark_failed(event_id, reason).await
    }
}

/// Poller context and replay service whose bus and outbox share one journal.
fn journaled(
    outbox: &InMemoryOutboxClient,
    store: &InMemoryDeadLetterStore,
) -> (PollerContext, ReplayService, Journal) {
    let config = Arc::new(RelayConfig::default());
    let journal = Journal::default();
    let publisher = Arc::new(RetryingPublisher::new(
        Arc::new(JournaledPublisher {
            inner: RecordingPublisher::new(),
            journal: journal.clone(),
        }),
        config.retry.clone(),
    ));
    let outbox: Arc<dyn OutboxClient> = Arc::new(JournaledOutbox {
        inner: outbox.clone(),
        journal: journal.clone(),
    });
    let store: Arc<dyn DeadLetterStore> = Arc::new(store.clone());

    let ctx = PollerContext::new(config.clone(), outbox.clone(), store.clone(), publisher.clone());
    let replay = ReplayService::new(config, store, publisher, outbox);
    (ctx, replay, journal)
}

mod delivery_tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_single_message_is_published_then_marked_sent() {
        let h = Harness::new(RecordingPublisher::new());
        h.outbox
            .insert(OutboxEventRecord::pending("e1", "HOBOM_MESSAGE", json!({"title": "Hi"})))
            .await;

        MessagePoller::new(h.ctx.clone())
            .poll(&CancellationToken::new())
            .await;

        let attempts = h.publisher.attempts().await;
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].key, "e1");
        assert_eq!(attempts[0].topic, "hobom.messages");

        assert_eq!(
            h.outbox.calls().await,
            vec![MarkCall::Sent {
                event_id: "e1".to_string()
            }]
        );
        assert!(h.store.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_mark_sent_follows_its_publish() {
        let outbox = InMemoryOutboxClient::new();
        outbox
            .insert(OutboxEventRecord::pending("e1", "HOBOM_MESSAGE", json!({"title": "a"})))
            .await;
        outbox
            .insert(OutboxEventRecord::pending("e2", "HOBOM_MESSAGE", json!({"title": "b"})))
            .await;
        let (ctx, _, journal) = journaled(&outbox, &InMemoryDeadLetterStore::new());

        MessagePoller::new(ctx).poll(&CancellationToken::new()).await;

        assert_eq!(
            journal.entries().await,
            vec!["publish:e1", "sent:e1", "publish:e2", "sent:e2"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_log_batch_is_published_before_marks() {
        let outbox = InMemoryOutboxClient::new();
        outbox.insert(log_record("l1")).await;
        outbox.insert(log_record("l2")).await;
        let (ctx, _, journal) = journaled(&outbox, &InMemoryDeadLetterStore::new());

        LogPoller::new(ctx).poll(&CancellationToken::new()).await;

        let entries = journal.entries().await;
        assert_eq!(entries.len(), 3);
        assert!(entries[0].starts_with("publish:log-batch-"));
        assert_eq!(&entries[1..], ["sent:l1", "sent:l2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_log_batch_creates_one_entry_per_event() {
        let h = Harness::new(RecordingPublisher::new().failing_always());
        h.outbox.insert(log_record("l1")).await;
        h.outbox.insert(log_record("l2")).await;

        LogPoller::new(h.ctx.clone())
            .poll(&CancellationToken::new())
            .await;

        let instants = h.publisher.attempt_instants().await;
        assert_eq!(instants.len(), 3);
        assert_eq!(instants[1] - instants[0], Duration::from_millis(200));
        assert_eq!(instants[2] - instants[1], Duration::from_millis(400));

        for id in ["l1", "l2"] {
            assert_eq!(h.outbox.status_of(id).await, Some(OutboxStatus::Failed));

            let raw = h.store.get(&format!("dlq:log:{id}")).await.unwrap();
            let entry: Value = serde_json::from_slice(&raw).unwrap();
            let entry = entry.as_array().unwrap();
            assert_eq!(entry.len(), 1);
            assert_eq!(entry[0]["traceId"], format!("trace-{id}"));
        }
        assert_eq!(h.store.len().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transform_failure_never_publishes_or_dead_letters() {
        let h = Harness::new(RecordingPublisher::new());
        h.outbox
            .insert(OutboxEventRecord::pending("e1", "HOBOM_MESSAGE", json!("not an object")))
            .await;
        h.outbox
            .insert(OutboxEventRecord::pending("l1", "HOBOM_LOG", json!({"level": "INFO"})))
            .await;

        let cancel = CancellationToken::new();
        MessagePoller::new(h.ctx.clone()).poll(&cancel).await;
        LogPoller::new(h.ctx.clone()).poll(&cancel).await;

        assert_eq!(h.publisher.attempt_count().await, 0);
        assert_eq!(h.outbox.status_of("e1").await, Some(OutboxStatus::Failed));
        assert_eq!(h.outbox.status_of("l1").await, Some(OutboxStatus::Failed));
        assert!(h.store.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_message_is_marked_failed_and_dead_lettered() {
        let h = Harness::new(RecordingPublisher::new().failing_always());
        h.outbox
            .insert(OutboxEventRecord::pending("e3", "HOBOM_MESSAGE", json!({"title": "Hi"})))
            .await;

        MessagePoller::new(h.ctx.clone())
            .poll(&CancellationToken::new())
            .await;

        assert_eq!(h.publisher.attempt_count().await, 3);
        let failed = h.outbox.failed_calls().await;
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].0, "e3");

        let raw = h.store.get("dlq:menu:e3").await.unwrap();
        let entry: Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(entry["title"], "Hi");
        assert_eq!(entry["type"], "MAIL_MESSAGE");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_mid_backoff_leaves_events_pending() {
        let h = Harness::new(RecordingPublisher::new().failing_always());
        h.outbox
            .insert(OutboxEventRecord::pending("e1", "HOBOM_MESSAGE", json!({"title": "a"})))
            .await;
        h.outbox
            .insert(OutboxEventRecord::pending("e2", "HOBOM_MESSAGE", json!({"title": "b"})))
            .await;

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        MessagePoller::new(h.ctx.clone()).poll(&cancel).await;

        // Each item still gets its first attempt; only the backoff is cut short.
        let attempts = h.publisher.attempts().await;
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts[0].key, "e1");
        assert_eq!(attempts[1].key, "e2");
        assert_eq!(h.outbox.status_of("e1").await, Some(OutboxStatus::Pending));
        assert_eq!(h.outbox.status_of("e2").await, Some(OutboxStatus::Pending));
        assert!(h.outbox.calls().await.is_empty());
        assert!(h.store.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_update_failures_are_contained() {
        let h = Harness::new(RecordingPublisher::new());
        h.outbox.set_fail_mark_sent(true);
        h.outbox
            .insert(OutboxEventRecord::pending("e1", "HOBOM_MESSAGE", json!({})))
            .await;
        h.outbox
            .insert(OutboxEventRecord::pending("e2", "HOBOM_MESSAGE", json!({})))
            .await;

        MessagePoller::new(h.ctx.clone())
            .poll(&CancellationToken::new())
            .await;

        assert_eq!(h.publisher.published().await.len(), 2);
        assert_eq!(h.outbox.sent_ids().await, vec!["e1".to_string(), "e2".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dead_letter_save_failure_is_contained() {
        let h = Harness::new(RecordingPublisher::new().failing_always());
        h.store.set_fail_saves(true);
        h.outbox.insert(log_record("l1")).await;

        LogPoller::new(h.ctx.clone())
            .poll(&CancellationToken::new())
            .await;

        assert_eq!(h.outbox.status_of("l1").await, Some(OutboxStatus::Failed));
        assert!(h.store.is_empty().await);
    }
}

mod replay_tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_successful_replay_removes_entry() {
        let h = Harness::new(RecordingPublisher::new());
        h.outbox
            .insert(OutboxEventRecord::pending("e5", "HOBOM_MESSAGE", json!({})))
            .await;
        h.store
            .save("dlq:menu:e5", br#"{"title":"Hi"}"#, TTL)
            .await
            .unwrap();

        h.replay
            .retry(&CancellationToken::new(), "dlq:menu:e5")
            .await
            .unwrap();

        assert!(!h.store.contains("dlq:menu:e5").await);
        assert_eq!(h.outbox.sent_ids().await, vec!["e5".to_string()]);
        assert_eq!(h.publisher.published().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_publishes_before_mark_sent() {
        let store = InMemoryDeadLetterStore::new();
        store
            .save("dlq:menu:e9", br#"{"title":"Hi"}"#, TTL)
            .await
            .unwrap();
        let (_, replay, journal) = journaled(&InMemoryOutboxClient::new(), &store);

        replay
            .retry(&CancellationToken::new(), "dlq:menu:e9")
            .await
            .unwrap();

        assert_eq!(journal.entries().await, vec!["publish:dlq:menu:e9", "sent:e9"]);
        assert!(!store.contains("dlq:menu:e9").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_replay_keeps_entry() {
        let h = Harness::new(RecordingPublisher::new().failing_always());
        h.store
            .save("dlq:menu:e5", br#"{"title":"Hi"}"#, TTL)
            .await
            .unwrap();

        let result = h.replay.retry(&CancellationToken::new(), "dlq:menu:e5").await;

        assert!(result.is_err());
        assert!(h.store.contains("dlq:menu:e5").await);
        assert!(h.outbox.calls().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_of_missing_key_leaves_store_unchanged() {
        let h = Harness::new(RecordingPublisher::new());
        h.store.save("dlq:log:b", b"[]", TTL).await.unwrap();

        let err = h
            .replay
            .retry(&CancellationToken::new(), "dlq:menu:a")
            .await
            .unwrap_err();

        assert!(matches!(err, RelayError::DeadLetterNotFound { .. }));
        assert_eq!(h.store.list("dlq:*").await.unwrap(), vec!["dlq:log:b".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_after_poller_failure() {
        let h = Harness::new(RecordingPublisher::new().failing_first(3));
        h.outbox
            .insert(OutboxEventRecord::pending("e7", "HOBOM_MESSAGE", json!({"title": "retry me"})))
            .await;

        MessagePoller::new(h.ctx.clone())
            .poll(&CancellationToken::new())
            .await;
        assert_eq!(h.outbox.status_of("e7").await, Some(OutboxStatus::Failed));

        h.replay
            .retry(&CancellationToken::new(), "dlq:menu:e7")
            .await
            .unwrap();

        assert_eq!(h.outbox.status_of("e7").await, Some(OutboxStatus::Sent));
        assert!(h.store.is_empty().await);

        let replayed = h.publisher.published().await;
        assert_eq!(replayed.len(), 1);
        assert_eq!(replayed[0].key, "dlq:menu:e7");
        assert_eq!(replayed[0].topic, "hobom.messages");
    }
}

mod key_tests {
    use super::*;

    #[tokio::test]
    async fn test_list_keys_by_prefix() {
        let h = Harness::new(RecordingPublisher::new());
        h.store.save("dlq:menu:a", b"{}", TTL).await.unwrap();
        h.store.save("dlq:log:b", b"[]", TTL).await.unwrap();

        assert_eq!(
            h.replay.list_keys("dlq:menu:").await.unwrap(),
            vec!["dlq:menu:a".to_string()]
        );

        let mut all = h.replay.list_keys("").await.unwrap();
        all.sort();
        assert_eq!(all, vec!["dlq:log:b".to_string(), "dlq:menu:a".to_string()]);
    }

    #[test]
    fn test_topic_inference() {
        let config = RelayConfig::default();
        assert_eq!(config.infer_topic("dlq:menu:x"), "hobom.messages");
        assert_eq!(config.infer_topic("dlq:log:x"), "hobom.logs");
        assert_eq!(config.infer_topic("dlq:billing:x"), "unknown-topic");
    }

    #[test]
    fn test_event_id_extraction() {
        assert_eq!(extract_event_id("dlq:menu:event-123"), "event-123");
        assert_eq!(extract_event_id("dlq:menu:"), "");
    }
}

mod scheduler_tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_run_drains_both_categories() {
        let config = RelayConfig::default().poll_interval(Duration::from_secs(5));
        let h = Harness::with_config(config, RecordingPublisher::new());
        h.outbox
            .insert(OutboxEventRecord::pending("e1", "HOBOM_MESSAGE", json!({"title": "Hi"})))
            .await;
        h.outbox.insert(log_record("l1")).await;

        let scheduler = Scheduler::with_default_pollers(h.ctx.clone());
        assert_eq!(scheduler.len(), 2);
        let handle = scheduler.start(CancellationToken::new());

        tokio::time::sleep(h.config.poll_interval + Duration::from_millis(100)).await;
        handle.shutdown_and_wait().await;

        assert_eq!(h.outbox.status_of("e1").await, Some(OutboxStatus::Sent));
        assert_eq!(h.outbox.status_of("l1").await, Some(OutboxStatus::Sent));

        let topics: Vec<String> = h
            .publisher
            .published()
            .await
            .into_iter()
            .map(|m| m.topic)
            .collect();
        assert!(topics.contains(&"hobom.messages".to_string()));
        assert!(topics.contains(&"hobom.logs".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_before_first_tick_runs_nothing() {
        let h = Harness::new(RecordingPublisher::new());
        h.outbox
            .insert(OutboxEventRecord::pending("e1", "HOBOM_MESSAGE", json!({})))
            .await;

        let handle = Scheduler::with_default_pollers(h.ctx.clone()).start(CancellationToken::new());
        handle.shutdown_and_wait().await;

        assert_eq!(h.publisher.attempt_count().await, 0);
        assert_eq!(h.outbox.status_of("e1").await, Some(OutboxStatus::Pending));
    }
}
