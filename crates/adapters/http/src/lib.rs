//! # Outbox Relay HTTP Adapter
//!
//! JSON-over-HTTP client for the upstream outbox service.
//!
//! | Operation | Request |
//! |-----------|---------|
//! | find      | `GET {base}/outbox?eventType={type}&status={status}` → `{"items": [...]}` |
//! | mark sent | `POST {base}/outbox/{eventId}/sent` |
//! | mark failed | `POST {base}/outbox/{eventId}/failed` with `{"errorMessage": reason}` |

use async_trait::async_trait;
use outbox_relay_core::error::{RelayError, RelayResult};
use outbox_relay_core::traits::OutboxClient;
use outbox_relay_core::types::{OutboxEventRecord, OutboxStatus};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct FindResponse {
    #[serde(default)]
    items: Vec<OutboxEventRecord>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MarkFailedRequest<'a> {
    error_message: &'a str,
}

/// Upstream outbox client over HTTP.
#[derive(Debug, Clone)]
pub struct HttpOutboxClient {
    client: Client,
    base_url: Url,
}

impl HttpOutboxClient {
    /// Creates a client with the default timeout.
    pub fn new(base_url: &str) -> RelayResult<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// Creates a client with a request timeout.
    pub fn with_timeout(base_url: &str, timeout: Duration) -> RelayResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::config(format!("Failed to build HTTP client: {e}")))?;

        Self::with_client(client, base_url)
    }

    /// Creates a client around an existing `reqwest::Client`.
    pub fn with_client(client: Client, base_url: &str) -> RelayResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| RelayError::config(format!("Invalid outbox base URL '{base_url}': {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(RelayError::config(format!(
                "Outbox base URL '{base_url}' cannot carry a path"
            )));
        }

        Ok(Self { client, base_url })
    }

    /// Builds `{base}/{segments...}` with each segment percent-encoded.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn post(&self, operation: &str, url: Url, body: Option<&MarkFailedRequest<'_>>) -> RelayResult<()> {
        let mut request = self.client.post(url);
        if let Some(body) = body {
            request = request.json(body);
        }

        request
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(|e| RelayError::outbox_rpc(operation, e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl OutboxClient for HttpOutboxClient {
    async fn find_by_category_and_status(
        &self,
        event_type: &str,
        status: OutboxStatus,
    ) -> RelayResult<Vec<OutboxEventRecord>> {
        let response = self
            .client
            .get(self.url(&["outbox"]))
            .query(&[("eventType", event_type), ("status", status.as_str())])
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(|e| RelayError::outbox_rpc("find", e.to_string()))?;

        let body: FindResponse = response
            .json()
            .await
            .map_err(|e| RelayError::outbox_rpc("find", format!("invalid response body: {e}")))?;

        Ok(body.items)
    }

    async fn mark_sent(&self, event_id: &str) -> RelayResult<()> {
        self.post("mark_sent", self.url(&["outbox", event_id, "sent"]), None)
            .await
    }

    async fn mark_failed(&self, event_id: &str, reason: &str) -> RelayResult<()> {
        let body = MarkFailedRequest {
            error_message: reason,
        };
        self.post("mark_failed", self.url(&["outbox", event_id, "failed"]), Some(&body))
            .await
    }
}
