//! Dead-letter keys.
//!
//! Keys are `category_prefix + event_id`, e.g. `dlq:menu:event-123`. Inside
//! the relay they travel as a structured `DeadLetterKey` and are flattened to
//! the wire string only at the store boundary.

use crate::config::RelayConfig;
use crate::types::EventCategory;

/// Separator between the segments of a dead-letter key.
pub const KEY_SEPARATOR: char = ':';

/// Returns the substring after the final separator.
///
/// `dlq:menu:event-123` yields `event-123`; `dlq:menu:` yields an empty
/// string, which callers treat as a malformed key.
pub fn extract_event_id(key: &str) -> &str {
    key.rsplit(KEY_SEPARATOR).next().unwrap_or_default()
}

/// Structured dead-letter key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeadLetterKey {
    pub category: EventCategory,
    pub event_id: String,
}

impl DeadLetterKey {
    /// Creates a key for an event of the given category.
    pub fn new(category: EventCategory, event_id: impl Into<String>) -> Self {
        Self {
            category,
            event_id: event_id.into(),
        }
    }

    /// Renders the flat store key using the configured prefix.
    pub fn render(&self, config: &RelayConfig) -> String {
        format!(
            "{}{}",
            config.route(self.category).dead_letter_prefix,
            self.event_id
        )
    }
}
