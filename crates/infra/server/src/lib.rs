//! # Outbox Relay Server
//!
//! Standalone relay service. Wires the Redis dead-letter store, the NATS
//! publisher and the HTTP outbox client into the pollers, runs them on the
//! scheduler, and serves the admin API until a shutdown signal arrives.

mod config;

pub use config::{
    load_config, load_from_env, parse_config, AppConfig, ConfigError, NatsConfig, OutboxConfig,
    RedisConfig, RelaySettings, ServerConfig,
};

use std::sync::Arc;

use outbox_relay::{
    CancellationToken, HookedPublisher, LoggingPublishHook, PollerContext, ReplayService,
    RetryingPublisher, Scheduler,
};
use outbox_relay_admin::{admin_router, AdminConfig, AdminState};
use outbox_relay_core::config::RelayConfig;
use outbox_relay_core::traits::MessagePublisher;
use outbox_relay_http::HttpOutboxClient;
use outbox_relay_nats::NatsPublisher;
use outbox_relay_redis::RedisDeadLetterStore;
use tracing_subscriber::EnvFilter;

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `default_level`.
pub fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// The relay service.
pub struct RelayServer {
    /// Service configuration.
    pub config: AppConfig,
    cancel: CancellationToken,
}

impl RelayServer {
    /// Creates a new relay server.
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Returns the token that stops the server when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs the relay until shutdown.
    ///
    /// Shutdown order: the HTTP server stops accepting requests, the workers
    /// finish their current cycle, then the bus client is flushed.
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error>> {
        let relay_config = Arc::new(self.config.relay.to_relay_config());
        relay_config.validate()?;

        // Bind first; nothing has been started if this fails.
        let addr = format!("{}:{}", self.config.server.host, self.config.server.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;

        let store = Arc::new(RedisDeadLetterStore::connect(&self.config.redis.url).await?);
        let bus = NatsPublisher::connect(&self.config.nats.url)
            .await?
            .with_ack_timeout(self.config.nats.ack_timeout());
        bus.ensure_stream(&self.config.nats.stream, relay_topics(&relay_config))
            .await?;
        let publisher: Arc<dyn MessagePublisher> =
            Arc::new(HookedPublisher::new(Arc::new(bus)).with_hook(LoggingPublishHook::new()));
        let outbox = Arc::new(HttpOutboxClient::with_timeout(
            &self.config.outbox.base_url,
            self.config.outbox.timeout(),
        )?);
        let retrying = Arc::new(RetryingPublisher::new(
            publisher.clone(),
            relay_config.retry.clone(),
        ));

        let ctx = PollerContext::new(
            relay_config.clone(),
            outbox.clone(),
            store.clone(),
            retrying.clone(),
        );
        let scheduler = Scheduler::with_default_pollers(ctx).start(self.cancel.clone());
        tracing::info!(
            interval_ms = relay_config.poll_interval.as_millis() as u64,
            "Relay workers started"
        );

        let replay = ReplayService::new(relay_config, store, retrying, outbox);
        let admin = AdminConfig::new().base_path(self.config.server.admin_base_path.clone());
        let admin = if self.config.server.enable_admin_api {
            admin
        } else {
            admin.disabled()
        };
        let app = admin_router(&admin, AdminState::new(replay, self.cancel.clone()));

        tracing::info!("Starting outbox relay on {}", addr);

        let served = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal(self.cancel.clone()))
            .await;

        self.cancel.cancel();
        scheduler.shutdown_and_wait().await;
        tracing::info!("Relay workers stopped");

        if let Err(err) = publisher.close().await {
            tracing::warn!(error = %err, "Failed to flush publisher");
        }

        served?;
        tracing::info!("Outbox relay stopped");
        Ok(())
    }
}

/// Subjects the JetStream stream must bind: both category topics and the
/// topic replay falls back to for unrecognised keys.
pub fn relay_topics(config: &RelayConfig) -> Vec<String> {
    let mut topics: Vec<String> = Vec::new();
    for topic in [&config.message.topic, &config.log.topic, &config.unknown_topic] {
        if !topics.contains(topic) {
            topics.push(topic.clone());
        }
    }
    topics
}

impl Default for RelayServer {
    fn default() -> Self {
        Self::new(AppConfig::default())
    }
}

async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
        _ = cancel.cancelled() => {}
    }

    tracing::info!("Shutdown signal received");
    cancel.cancel();
}
