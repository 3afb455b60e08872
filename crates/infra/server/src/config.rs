//! Server configuration.
//!
//! Loaded from TOML; every section and field is optional.
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 8082
//! log_level = "info"
//!
//! [relay]
//! poll_interval_ms = 5000
//! dead_letter_ttl_secs = 259200
//! max_attempts = 3
//! base_delay_ms = 200
//!
//! [redis]
//! url = "redis://127.0.0.1:6379"
//!
//! [nats]
//! url = "nats://127.0.0.1:4222"
//! stream = "HOBOM_RELAY"
//!
//! [outbox]
//! base_url = "http://127.0.0.1:8080/api"
//! ```

use outbox_relay_core::config::{RelayConfig, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "RELAY_CONFIG";

/// Config file used when the environment variable is unset.
pub const DEFAULT_CONFIG_PATH: &str = "relay.toml";

/// HTTP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Default log filter when `RUST_LOG` is unset.
    pub log_level: String,
    /// Path the admin API is nested under.
    pub admin_base_path: String,
    /// Enable the admin API.
    pub enable_admin_api: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8082,
            log_level: "info".to_string(),
            admin_base_path: "/internal/api/v1".to_string(),
            enable_admin_api: true,
        }
    }
}

/// Relay timing overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelaySettings {
    pub poll_interval_ms: u64,
    pub dead_letter_ttl_secs: u64,
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub multiplier: u32,
    /// Overrides the message topic.
    pub message_topic: Option<String>,
    /// Overrides the log topic.
    pub log_topic: Option<String>,
}

impl Default for RelaySettings {
    fn default() -> Self {
        let defaults = RelayConfig::default();
        Self {
            poll_interval_ms: defaults.poll_interval.as_millis() as u64,
            dead_letter_ttl_secs: defaults.dead_letter_ttl.as_secs(),
            max_attempts: defaults.retry.max_attempts,
            base_delay_ms: defaults.retry.base_delay.as_millis() as u64,
            multiplier: defaults.retry.multiplier,
            message_topic: None,
            log_topic: None,
        }
    }
}

impl RelaySettings {
    /// Builds the relay configuration these settings describe.
    pub fn to_relay_config(&self) -> RelayConfig {
        let retry = RetryPolicy::new(self.max_attempts, Duration::from_millis(self.base_delay_ms))
            .multiplier(self.multiplier);

        let mut config = RelayConfig::new()
            .poll_interval(Duration::from_millis(self.poll_interval_ms))
            .dead_letter_ttl(Duration::from_secs(self.dead_letter_ttl_secs))
            .retry(retry);

        if let Some(topic) = &self.message_topic {
            config.message.topic = topic.clone();
        }
        if let Some(topic) = &self.log_topic {
            config.log.topic = topic.clone();
        }
        config
    }
}

/// Redis connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub url: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
        }
    }
}

/// NATS connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NatsConfig {
    pub url: String,
    /// JetStream stream bound to the relay topics.
    pub stream: String,
    pub ack_timeout_ms: u64,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: "nats://127.0.0.1:4222".to_string(),
            stream: "HOBOM_RELAY".to_string(),
            ack_timeout_ms: 5_000,
        }
    }
}

impl NatsConfig {
    /// Returns how long a publish waits for the stream acknowledgement.
    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }
}

/// Upstream outbox service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutboxConfig {
    pub base_url: String,
    pub timeout_ms: u64,
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080/api".to_string(),
            timeout_ms: 10_000,
        }
    }
}

impl OutboxConfig {
    /// Returns the request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Complete service configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub relay: RelaySettings,
    pub redis: RedisConfig,
    pub nats: NatsConfig,
    pub outbox: OutboxConfig,
}

/// Parses configuration from TOML text.
pub fn parse_config(content: &str) -> Result<AppConfig, ConfigError> {
    let config: AppConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

    config
        .relay
        .to_relay_config()
        .validate()
        .map_err(|e| ConfigError::Invalid(e.to_string()))?;

    Ok(config)
}

/// Loads configuration from a TOML file.
pub fn load_config(path: impl AsRef<Path>) -> Result<AppConfig, ConfigError> {
    let content =
        std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
    parse_config(&content)
}

/// Loads configuration from `$RELAY_CONFIG` or `relay.toml`.
///
/// A missing file yields the defaults.
pub fn load_from_env() -> Result<AppConfig, ConfigError> {
    let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

    if !Path::new(&path).exists() {
        return Ok(AppConfig::default());
    }

    load_config(&path)
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8082);
        assert_eq!(config.nats.stream, "HOBOM_RELAY");
        assert_eq!(config.nats.ack_timeout(), Duration::from_secs(5));

        let relay = config.relay.to_relay_config();
        assert_eq!(relay.poll_interval, Duration::from_secs(5));
        assert_eq!(relay.dead_letter_ttl, Duration::from_secs(72 * 60 * 60));
        assert_eq!(relay.retry, RetryPolicy::default());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = parse_config(
            r#"
            [server]
            port = 9000

            [relay]
            poll_interval_ms = 1000
            log_topic = "hobom.logs.v2"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");

        let relay = config.relay.to_relay_config();
        assert_eq!(relay.poll_interval, Duration::from_secs(1));
        assert_eq!(relay.retry.max_attempts, 3);
        assert_eq!(relay.log.topic, "hobom.logs.v2");
        assert_eq!(relay.message.topic, "hobom.messages");
    }

    #[test]
    fn test_rejects_invalid_relay_settings() {
        let err = parse_config("[relay]\nmax_attempts = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_malformed_toml() {
        assert!(matches!(
            parse_config("[server\nport = "),
            Err(ConfigError::ParseError(_))
        ));
    }
}
