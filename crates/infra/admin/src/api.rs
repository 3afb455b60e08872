//! Admin API handlers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use outbox_relay::{CancellationToken, ReplayService, ReplaySummary};
use outbox_relay_core::error::RelayError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Shared state for admin routes.
#[derive(Clone)]
pub struct AdminState {
    pub replay: ReplayService,
    /// Aborts replay backoff when the process shuts down.
    pub cancel: CancellationToken,
}

impl AdminState {
    /// Creates admin state.
    pub fn new(replay: ReplayService, cancel: CancellationToken) -> Self {
        Self { replay, cancel }
    }
}

/// Optional key prefix filter.
#[derive(Debug, Default, Deserialize)]
pub struct PrefixQuery {
    #[serde(default)]
    pub prefix: String,
}

/// Key list response.
#[derive(Debug, Serialize, Deserialize)]
pub struct KeyListResponse {
    pub items: Vec<String>,
}

/// Single entry response.
#[derive(Debug, Serialize, Deserialize)]
pub struct EntryResponse {
    pub item: Value,
}

/// Success message response.
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Health response.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub status_code: u16,
    pub message: String,
}

/// A relay error rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub RelayError);

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorResponse {
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

pub(crate) async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        status_code: StatusCode::OK.as_u16(),
        message: "outbox relay is running".to_string(),
    })
}

pub(crate) async fn list_handler(
    State(state): State<AdminState>,
    Query(query): Query<PrefixQuery>,
) -> ApiResult<KeyListResponse> {
    let items = state.replay.list_keys(&query.prefix).await?;
    Ok(Json(KeyListResponse { items }))
}

pub(crate) async fn get_handler(
    State(state): State<AdminState>,
    Path(key): Path<String>,
) -> ApiResult<EntryResponse> {
    let raw = state.replay.get_value(&key).await?;
    let item = serde_json::from_slice(&raw).map_err(|e| {
        tracing::error!(key = %key, error = %e, "Stored dead-letter entry is not JSON");
        RelayError::internal("Failed to parse DLQ JSON")
    })?;
    Ok(Json(EntryResponse { item }))
}

pub(crate) async fn retry_handler(
    State(state): State<AdminState>,
    Path(key): Path<String>,
) -> ApiResult<MessageResponse> {
    state.replay.retry(&state.cancel, &key).await?;
    Ok(Json(MessageResponse {
        message: format!("Retried dead-letter entry: {key}"),
    }))
}

pub(crate) async fn retry_all_handler(
    State(state): State<AdminState>,
    Query(query): Query<PrefixQuery>,
) -> ApiResult<ReplaySummary> {
    let summary = state
        .replay
        .retry_matching(&state.cancel, &query.prefix)
        .await?;
    Ok(Json(summary))
}
