//! Relay configuration.
//!
//! Every constant the relay honors (poll interval, retry policy, dead-letter
//! retention, category prefixes and topics) lives in `RelayConfig`, which is
//! handed to each component at construction.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::dead_letter::KEY_SEPARATOR;
use crate::error::{RelayError, RelayResult};
use crate::types::EventCategory;

/// Default interval between poll cycles.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default retention for dead-letter entries (72 hours).
pub const DEFAULT_DEAD_LETTER_TTL: Duration = Duration::from_secs(72 * 60 * 60);

/// Topic returned for dead-letter keys that match no known category.
pub const UNKNOWN_TOPIC: &str = "unknown-topic";

/// Bounded retry policy with exponential backoff.
///
/// The wait after failed attempt `n` (1-based) is
/// `base_delay * multiplier^(n - 1)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Wait before the second attempt.
    pub base_delay: Duration,
    /// Growth factor applied to each further wait.
    pub multiplier: u32,
}

impl RetryPolicy {
    /// Creates a policy with a multiplier of 2.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            multiplier: 2,
        }
    }

    /// Sets the backoff multiplier.
    pub fn multiplier(mut self, multiplier: u32) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Returns the wait after failed attempt `attempt`, or None once the
    /// attempts are exhausted.
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt >= self.max_attempts {
            return None;
        }

        let factor = self.multiplier.saturating_pow(attempt - 1);
        Some(self.base_delay.saturating_mul(factor))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(200))
    }
}

/// Where one event category comes from and goes to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRoute {
    /// Event type tag queried upstream.
    pub event_type: String,
    /// Dead-letter key prefix; ends with the key separator.
    pub dead_letter_prefix: String,
    /// Bus topic.
    pub topic: String,
}

impl CategoryRoute {
    /// Creates a route.
    pub fn new(
        event_type: impl Into<String>,
        dead_letter_prefix: impl Into<String>,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            dead_letter_prefix: dead_letter_prefix.into(),
            topic: topic.into(),
        }
    }
}

/// Configuration shared by the pollers, the scheduler and replay.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Interval between poll cycles of one worker.
    pub poll_interval: Duration,
    /// Retention of dead-letter entries.
    pub dead_letter_ttl: Duration,
    /// Publish retry policy.
    pub retry: RetryPolicy,
    /// Message category route.
    pub message: CategoryRoute,
    /// Log category route.
    pub log: CategoryRoute,
    /// Namespace every dead-letter key starts with.
    pub dead_letter_namespace: String,
    /// Topic used when a dead-letter key matches no category.
    pub unknown_topic: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            dead_letter_ttl: DEFAULT_DEAD_LETTER_TTL,
            retry: RetryPolicy::default(),
            message: CategoryRoute::new("HOBOM_MESSAGE", "dlq:menu:", "hobom.messages"),
            log: CategoryRoute::new("HOBOM_LOG", "dlq:log:", "hobom.logs"),
            dead_letter_namespace: "dlq:".to_string(),
            unknown_topic: UNKNOWN_TOPIC.to_string(),
        }
    }
}

impl RelayConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the poll interval.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the dead-letter retention.
    pub fn dead_letter_ttl(mut self, ttl: Duration) -> Self {
        self.dead_letter_ttl = ttl;
        self
    }

    /// Sets the retry policy.
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Returns the route for a category.
    pub fn route(&self, category: EventCategory) -> &CategoryRoute {
        match category {
            EventCategory::Message => &self.message,
            EventCategory::Log => &self.log,
        }
    }

    /// Glob pattern matching every dead-letter key.
    pub fn dead_letter_pattern(&self) -> String {
        format!("{}*", self.dead_letter_namespace)
    }

    /// Returns the category whose prefix the key starts with.
    pub fn category_for_key(&self, key: &str) -> Option<EventCategory> {
        EventCategory::ALL
            .into_iter()
            .find(|category| key.starts_with(&self.route(*category).dead_letter_prefix))
    }

    /// Infers the bus topic for a dead-letter key.
    ///
    /// Unrecognized prefixes map to the unknown-topic sentinel rather than
    /// failing.
    pub fn infer_topic(&self, key: &str) -> &str {
        match self.category_for_key(key) {
            Some(category) => &self.route(category).topic,
            None => &self.unknown_topic,
        }
    }

    /// Checks the configuration for values the relay cannot work with.
    pub fn validate(&self) -> RelayResult<()> {
        if self.retry.max_attempts == 0 {
            return Err(RelayError::config("retry.max_attempts must be at least 1"));
        }
        if self.retry.multiplier == 0 {
            return Err(RelayError::config("retry.multiplier must be at least 1"));
        }
        if self.poll_interval.is_zero() {
            return Err(RelayError::config("poll_interval must be positive"));
        }

        for category in EventCategory::ALL {
            let route = self.route(category);
            if !route.dead_letter_prefix.ends_with(KEY_SEPARATOR) {
                return Err(RelayError::config(format!(
                    "dead-letter prefix '{}' for {} must end with '{}'",
                    route.dead_letter_prefix, category, KEY_SEPARATOR
                )));
            }
            if !route
                .dead_letter_prefix
                .starts_with(&self.dead_letter_namespace)
            {
                return Err(RelayError::config(format!(
                    "dead-letter prefix '{}' is outside namespace '{}'",
                    route.dead_letter_prefix, self.dead_letter_namespace
                )));
            }
        }

        if self.message.dead_letter_prefix == self.log.dead_letter_prefix {
            return Err(RelayError::config("categories must use distinct dead-letter prefixes"));
        }

        Ok(())
    }
}
