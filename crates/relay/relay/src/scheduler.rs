//! Periodic scheduling of pollers.
//!
//! Each registered poller gets its own worker task with an independent
//! interval. Workers share one cancellation token; on shutdown a worker stops
//! scheduling new cycles, lets the cycle in flight finish, and exits.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::info;

use crate::poller::{LogPoller, MessagePoller, Poller, PollerContext};

/// Runs registered pollers on a fixed interval.
pub struct Scheduler {
    interval: Duration,
    pollers: Vec<Arc<dyn Poller>>,
}

impl Scheduler {
    /// Creates a scheduler with no pollers.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            pollers: Vec::new(),
        }
    }

    /// Creates a scheduler running the message and log pollers at the
    /// configured poll interval.
    pub fn with_default_pollers(ctx: PollerContext) -> Self {
        Self::new(ctx.config.poll_interval)
            .register(Arc::new(MessagePoller::new(ctx.clone())))
            .register(Arc::new(LogPoller::new(ctx)))
    }

    /// Adds a poller.
    pub fn register(mut self, poller: Arc<dyn Poller>) -> Self {
        self.pollers.push(poller);
        self
    }

    /// Returns the number of registered pollers.
    pub fn len(&self) -> usize {
        self.pollers.len()
    }

    /// Checks if no pollers are registered.
    pub fn is_empty(&self) -> bool {
        self.pollers.is_empty()
    }

    /// Spawns one worker per poller and returns a handle to stop them.
    ///
    /// The first cycle of each worker runs one interval after start.
    pub fn start(self, cancel: CancellationToken) -> SchedulerHandle {
        let tracker = TaskTracker::new();

        for poller in self.pollers {
            tracker.spawn(run_worker(poller, self.interval, cancel.clone()));
        }
        tracker.close();

        SchedulerHandle { cancel, tracker }
    }
}

async fn run_worker(poller: Arc<dyn Poller>, period: Duration, cancel: CancellationToken) {
    let name = poller.name();
    info!(worker = name, interval_ms = period.as_millis() as u64, "Worker started");

    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                poller.poll(&cancel).await;
            }
        }
    }

    info!(worker = name, "Worker stopped");
}

/// Handle to the running workers.
pub struct SchedulerHandle {
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl SchedulerHandle {
    /// Signals every worker to stop after its current cycle.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Waits until every worker has exited.
    pub async fn wait(&self) {
        self.tracker.wait().await;
    }

    /// Signals shutdown and waits for the workers.
    pub async fn shutdown_and_wait(&self) {
        self.shutdown();
        self.wait().await;
    }

    /// Returns the token shared by the workers.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }
}
