//! # Outbox Relay NATS Adapter
//!
//! Publishes relay messages to NATS JetStream. The message topic becomes the
//! subject; the partitioning key and timestamp travel as headers next to any
//! headers the message already carries.
//!
//! A publish succeeds only once the stream has acknowledged the message, so
//! the subjects must be bound to a stream (see [`NatsPublisher::ensure_stream`]).

use std::time::Duration;

use async_nats::jetstream::{self, stream::Config as StreamConfig};
use async_nats::{Client, HeaderMap};
use async_trait::async_trait;
use outbox_relay_core::error::{RelayError, RelayResult};
use outbox_relay_core::message::PublishableMessage;
use outbox_relay_core::traits::MessagePublisher;

/// Header carrying the message key.
pub const KEY_HEADER: &str = "Relay-Key";

/// Header carrying the RFC 3339 message timestamp.
pub const TIMESTAMP_HEADER: &str = "Relay-Timestamp";

/// How long a publish waits for the stream acknowledgement by default.
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(5);

/// Message publisher over a JetStream context.
#[derive(Clone)]
pub struct NatsPublisher {
    client: Client,
    jetstream: jetstream::Context,
}

impl NatsPublisher {
    /// Creates a publisher from a connected client.
    pub fn new(client: Client) -> Self {
        let mut jetstream = jetstream::new(client.clone());
        jetstream.set_timeout(DEFAULT_ACK_TIMEOUT);
        Self { client, jetstream }
    }

    /// Connects to the NATS server at `url`.
    pub async fn connect(url: &str) -> RelayResult<Self> {
        let client = async_nats::connect(url)
            .await
            .map_err(|e| RelayError::internal(format!("NATS connect failed: {e}")))?;

        tracing::info!(url = %url, "Connected to NATS");
        Ok(Self::new(client))
    }

    /// Sets how long a publish waits for the stream acknowledgement.
    pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.jetstream.set_timeout(timeout);
        self
    }

    /// Creates the stream binding `subjects` unless it already exists.
    pub async fn ensure_stream(&self, name: &str, subjects: Vec<String>) -> RelayResult<()> {
        self.jetstream
            .get_or_create_stream(StreamConfig {
                name: name.to_string(),
                subjects: subjects.clone(),
                ..Default::default()
            })
            .await
            .map_err(|e| RelayError::internal(format!("NATS stream setup failed: {e}")))?;

        tracing::info!(stream = %name, subjects = ?subjects, "JetStream stream ready");
        Ok(())
    }

    /// Returns the underlying client.
    pub fn client(&self) -> &Client {
        &self.client
    }
}

/// Builds the NATS headers for a message.
pub fn message_headers(message: &PublishableMessage) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in &message.headers {
        headers.insert(name.as_str(), value.as_str());
    }
    headers.insert(KEY_HEADER, message.key.as_str());
    headers.insert(TIMESTAMP_HEADER, message.timestamp.to_rfc3339().as_str());
    headers
}

#[async_trait]
impl MessagePublisher for NatsPublisher {
    async fn publish(&self, message: &PublishableMessage) -> RelayResult<()> {
        let ack = self
            .jetstream
            .publish_with_headers(
                message.topic.clone(),
                message_headers(message),
                message.value.clone().into(),
            )
            .await
            .map_err(|e| RelayError::publish(&message.topic, e.to_string()))?;

        ack.await
            .map_err(|e| RelayError::publish(&message.topic, format!("no ack: {e}")))?;

        Ok(())
    }

    async fn close(&self) -> RelayResult<()> {
        self.client
            .flush()
            .await
            .map_err(|e| RelayError::internal(format!("NATS flush failed: {e}")))
    }
}
