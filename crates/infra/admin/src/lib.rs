//! # Outbox Relay Admin
//!
//! Operator HTTP API for the dead-letter store: list keys, inspect an entry,
//! and replay one key or every key under a prefix.
//!
//! ```rust,ignore
//! let app = admin_router(&AdminConfig::default(), AdminState::new(replay, cancel));
//! axum::serve(listener, app).await?;
//! ```

mod api;

pub use api::*;

use axum::routing::{get, post};
use axum::Router;

/// Admin API configuration.
#[derive(Debug, Clone)]
pub struct AdminConfig {
    /// Whether the API is mounted.
    pub enabled: bool,
    /// Path the routes are nested under.
    pub base_path: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_path: "/internal/api/v1".to_string(),
        }
    }
}

impl AdminConfig {
    /// Creates a new admin config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base path.
    pub fn base_path(mut self, path: impl Into<String>) -> Self {
        self.base_path = path.into();
        self
    }

    /// Disables the API.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Creates the admin routes without a base path.
pub fn admin_routes<S>(state: AdminState) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/health", get(api::health_handler))
        .route("/dlq", get(api::list_handler))
        .route("/dlq/{key}", get(api::get_handler))
        .route("/dlq/retry", post(api::retry_all_handler))
        .route("/dlq/retry/{key}", post(api::retry_handler))
        .with_state(state)
}

/// Creates the admin router mounted at the configured base path.
///
/// A disabled config yields an empty router.
pub fn admin_router(config: &AdminConfig, state: AdminState) -> Router {
    if !config.enabled {
        return Router::new();
    }

    let base = config.base_path.trim_end_matches('/');
    if base.is_empty() {
        admin_routes(state)
    } else {
        Router::new().nest(base, admin_routes(state))
    }
}
