//! # Outbox Relay
//!
//! Drains pending outbox records onto the message bus. Per-category pollers
//! fetch, transform and publish records with bounded retries; records that
//! cannot be delivered are marked failed upstream and parked in the
//! dead-letter store, from where the replay service can republish them.
//!
//! ## Wiring
//!
//! ```rust,ignore
//! let config = Arc::new(RelayConfig::default());
//! let publisher = Arc::new(RetryingPublisher::new(bus, config.retry.clone()));
//! let ctx = PollerContext::new(config.clone(), outbox.clone(), store.clone(), publisher.clone());
//!
//! let handle = Scheduler::with_default_pollers(ctx).start(CancellationToken::new());
//! let replay = ReplayService::new(config, store, publisher, outbox);
//! // ...
//! handle.shutdown_and_wait().await;
//! ```

pub mod hooks;
pub mod poller;
pub mod replay;
pub mod retry;
pub mod scheduler;

pub use hooks::{HookedPublisher, LoggingPublishHook};
pub use poller::{LogPoller, MessagePoller, Poller, PollerContext};
pub use replay::{ReplayFailure, ReplayService, ReplaySummary};
pub use retry::RetryingPublisher;
pub use scheduler::{Scheduler, SchedulerHandle};

pub use outbox_relay_core;
pub use tokio_util::sync::CancellationToken;
