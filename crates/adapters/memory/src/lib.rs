//! # Outbox Relay Memory Adapter
//!
//! In-memory implementations of the relay's collaborator traits, primarily
//! intended for testing and development purposes.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use outbox_relay_memory::{InMemoryDeadLetterStore, InMemoryOutboxClient, RecordingPublisher};
//!
//! let store = Arc::new(InMemoryDeadLetterStore::new());
//! let outbox = Arc::new(InMemoryOutboxClient::new());
//! let publisher = Arc::new(RecordingPublisher::new().failing_first(2));
//! ```

mod dead_letter;
mod outbox;
mod publisher;

pub use dead_letter::InMemoryDeadLetterStore;
pub use outbox::{InMemoryOutboxClient, MarkCall};
pub use publisher::RecordingPublisher;
