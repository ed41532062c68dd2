//! Periodic polling of a change detector.
//!
//! Each [`FeedPoller`] owns its detector and drives it from a single tokio
//! task, so two polls of the same feed can never run at the same time. Ticks
//! that come due while a poll is still running are skipped. A poll that
//! panics is reported as an error event and the next tick runs as usual.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::error::{FeedwatchError, Result};
use crate::event::bus::panic_message;
use crate::event::{EventBus, FeedEvent};
use crate::feed::detector::ChangeDetector;
use crate::feed::fetcher::FeedSource;

/// Default poll interval in seconds (once per minute).
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

/// Polls a detector at a fixed interval.
pub struct FeedPoller<S> {
    detector: ChangeDetector<S>,
    interval: Duration,
}

impl<S: FeedSource + 'static> FeedPoller<S> {
    /// Create a poller with the default interval.
    pub fn new(detector: ChangeDetector<S>) -> Self {
        Self {
            detector,
            interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
        }
    }

    /// Create a poller with a custom interval.
    ///
    /// Fails if `interval` is zero.
    pub fn with_interval(detector: ChangeDetector<S>, interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(FeedwatchError::Validation(
                "poll interval must be greater than zero".to_string(),
            ));
        }
        Ok(Self { detector, interval })
    }

    /// The poll interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Spawn the poll loop on the current tokio runtime.
    ///
    /// The first poll happens immediately. Polling continues until
    /// [`PollerHandle::stop`] is called or the handle is dropped.
    pub fn start(self) -> PollerHandle<S> {
        let (stop_tx, stop_rx) = watch::channel(false);
        let url = self.detector.url().to_string();
        let events = Arc::clone(self.detector.events());
        let task = tokio::spawn(run(self.detector, self.interval, stop_rx));

        PollerHandle {
            url,
            events,
            stop_tx,
            task,
        }
    }
}

async fn run<S: FeedSource>(
    mut detector: ChangeDetector<S>,
    period: Duration,
    mut stop: watch::Receiver<bool>,
) -> ChangeDetector<S> {
    info!(
        feed = %detector.name(),
        url = %detector.url(),
        "poller started (interval: {} seconds)",
        period.as_secs()
    );
    detector.events().publish(FeedEvent::Started {
        name: detector.name().to_string(),
        url: detector.url().to_string(),
    });

    let mut timer = interval(period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            // Err means the handle was dropped
            _ = stop.changed() => break,
            _ = timer.tick() => {
                let result = AssertUnwindSafe(detector.poll()).catch_unwind().await;
                match result {
                    Ok(outcome) => debug!(feed = %detector.name(), ?outcome, "tick done"),
                    Err(payload) => {
                        let message = format!("poll panicked: {}", panic_message(&*payload));
                        error!(feed = %detector.name(), url = %detector.url(), "{}", message);
                        detector
                            .events()
                            .publish(FeedEvent::Error(FeedwatchError::Poller(message)));
                    }
                }
            }
        }
    }

    info!(feed = %detector.name(), "poller stopped");
    detector
}

/// Handle to a running poller.
pub struct PollerHandle<S> {
    url: String,
    events: Arc<EventBus>,
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<ChangeDetector<S>>,
}

impl<S> PollerHandle<S> {
    /// URL of the polled feed.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The detector's event bus, for subscribing while it runs.
    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Whether the poll task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop polling and return the detector.
    ///
    /// A poll already in progress is allowed to finish first.
    pub async fn stop(self) -> Result<ChangeDetector<S>> {
        // Ignored: the task may already be gone, which the join reports.
        let _ = self.stop_tx.send(true);
        self.task
            .await
            .map_err(|e| FeedwatchError::Poller(format!("poll task failed: {}", e)))
    }
}

impl<S> std::fmt::Debug for PollerHandle<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollerHandle")
            .field("url", &self.url)
            .field("finished", &self.task.is_finished())
            .finish_non_exhaustive()
    }
}
