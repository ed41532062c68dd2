//! Change detection for a single feed.
//!
//! A [`ChangeDetector`] remembers the GUID of the newest entry it has seen
//! (the baseline). Each [`poll`](ChangeDetector::poll) fetches the feed and
//! compares its newest entry against that baseline:
//!
//! - no baseline yet: the newest GUID becomes the baseline, nothing is emitted
//! - same GUID: nothing happens
//! - different GUID: every entry above the old baseline is published as new,
//!   and the newest GUID becomes the baseline
//!
//! If the old baseline is no longer in the feed the baseline is moved to the
//! newest entry without publishing anything.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{FeedwatchError, Result};
use crate::event::{EventBus, FeedEvent, SubscriptionId};
use crate::feed::fetcher::FeedSource;
use crate::feed::types::FeedEntry;

/// Per-feed polling state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedState {
    url: String,
    name: String,
    last_seen_guid: Option<String>,
}

impl FeedState {
    /// Create a cold state (no baseline).
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            name: name.into(),
            last_seen_guid: None,
        }
    }

    /// Feed URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// GUID of the newest entry seen by the last successful poll.
    pub fn last_seen_guid(&self) -> Option<&str> {
        self.last_seen_guid.as_deref()
    }
}

/// What a single poll cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The fetch failed; an error event was published.
    FetchFailed,
    /// The feed was empty or its newest entry had no usable GUID.
    NothingObservable,
    /// First successful poll; the baseline was recorded.
    BaselineEstablished,
    /// The newest entry is still the baseline.
    Unchanged,
    /// New entries were published; holds how many.
    NewItems(usize),
    /// The old baseline was not in the feed; the baseline moved without publishing.
    BaselineLost,
}

/// Detects new entries of one feed and publishes them.
pub struct ChangeDetector<S> {
    state: FeedState,
    source: S,
    events: Arc<EventBus>,
}

impl<S: FeedSource> ChangeDetector<S> {
    /// Create a detector with a random name.
    pub fn new(url: impl Into<String>, source: S) -> Self {
        Self::with_name(Uuid::new_v4().to_string(), url, source)
    }

    /// Create a detector with the given display name.
    pub fn with_name(name: impl Into<String>, url: impl Into<String>, source: S) -> Self {
        Self {
            state: FeedState::new(name, url),
            source,
            events: Arc::new(EventBus::new()),
        }
    }

    /// Feed URL.
    pub fn url(&self) -> &str {
        self.state.url()
    }

    /// Display name.
    pub fn name(&self) -> &str {
        self.state.name()
    }

    /// Change the display name.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.state.name = name.into();
    }

    /// Current baseline GUID.
    pub fn last_seen_guid(&self) -> Option<&str> {
        self.state.last_seen_guid()
    }

    /// Current polling state.
    pub fn state(&self) -> &FeedState {
        &self.state
    }

    /// The bus this detector publishes to.
    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Subscribe to newly detected entries.
    pub fn on_new_items<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&[FeedEntry]) + Send + Sync + 'static,
    {
        self.events.on_new_items(handler)
    }

    /// Subscribe to poll failures.
    pub fn on_error<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&FeedwatchError) + Send + Sync + 'static,
    {
        self.events.on_error(handler)
    }

    /// Run one poll cycle.
    ///
    /// Failures are published as error events, never returned.
    pub async fn poll(&mut self) -> PollOutcome {
        let entries = match self.source.fetch(&self.state.url).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(feed = %self.state.name, url = %self.state.url, "fetch failed: {}", e);
                self.events.publish(FeedEvent::Error(e));
                return PollOutcome::FetchFailed;
            }
        };

        let outcome = self.apply(entries);
        debug!(feed = %self.state.name, ?outcome, "poll finished");
        outcome
    }

    /// Fetch the feed and return the entries newer than `guid`.
    ///
    /// Returns an empty list when `guid` is not in the feed. Does not touch
    /// the baseline or publish anything.
    pub async fn new_items_after(&self, guid: &str) -> Result<Vec<FeedEntry>> {
        let mut entries = self.source.fetch(&self.state.url).await?;
        let count = entries_before(&entries, guid).unwrap_or(0);
        entries.truncate(count);
        Ok(entries)
    }

    fn apply(&mut self, mut entries: Vec<FeedEntry>) -> PollOutcome {
        let Some(newest) = entries.first().and_then(|e| e.usable_guid()).map(str::to_owned) else {
            debug!(
                feed = %self.state.name,
                entries = entries.len(),
                "no usable newest entry, skipping cycle"
            );
            return PollOutcome::NothingObservable;
        };

        let Some(previous) = self.state.last_seen_guid.replace(newest.clone()) else {
            info!(feed = %self.state.name, guid = %newest, "baseline established");
            return PollOutcome::BaselineEstablished;
        };

        if previous == newest {
            return PollOutcome::Unchanged;
        }

        match entries_before(&entries, &previous) {
            Some(count) => {
                entries.truncate(count);
                info!(feed = %self.state.name, count, "new entries detected");
                self.events.publish(FeedEvent::NewItems(entries));
                PollOutcome::NewItems(count)
            }
            None => {
                info!(
                    feed = %self.state.name,
                    previous = %previous,
                    current = %newest,
                    "previous baseline no longer in feed, re-anchoring"
                );
                PollOutcome::BaselineLost
            }
        }
    }
}

impl<S> std::fmt::Debug for ChangeDetector<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeDetector")
            .field("state", &self.state)
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

/// Number of entries preceding the first entry whose GUID is `guid`.
///
/// `None` if no entry carries that GUID.
pub fn entries_before(entries: &[FeedEntry], guid: &str) -> Option<usize> {
    entries
        .iter()
        .position(|e| e.guid.as_deref() == Some(guid))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(guids: &[&str]) -> Vec<FeedEntry> {
        guids.iter().map(|g| FeedEntry::new(*g)).collect()
    }

    #[test]
    fn test_entries_before_found() {
        let entries = feed(&["g4", "g3", "g2", "g1", "g0"]);
        assert_eq!(entries_before(&entries, "g1"), Some(3));
        assert_eq!(entries_before(&entries, "g4"), Some(0));
        assert_eq!(entries_before(&entries, "g0"), Some(4));
    }

    #[test]
    fn test_entries_before_missing() {
        let entries = feed(&["g4", "g3"]);
        assert_eq!(entries_before(&entries, "g1"), None);
        assert_eq!(entries_before(&[], "g1"), None);
    }

    #[test]
    fn test_entries_before_uses_first_match() {
        let entries = feed(&["g3", "g1", "g2", "g1"]);
        assert_eq!(entries_before(&entries, "g1"), Some(1));
    }

    #[test]
    fn test_entries_before_skips_missing_guids() {
        let entries = vec![
            FeedEntry::default().with_title("no guid"),
            FeedEntry::new("g2"),
            FeedEntry::new("g1"),
        ];
        assert_eq!(entries_before(&entries, "g1"), Some(2));
    }

    #[test]
    fn test_feed_state_starts_cold() {
        let state = FeedState::new("news", "https://example.com/rss");
        assert_eq!(state.name(), "news");
        assert_eq!(state.url(), "https://example.com/rss");
        assert!(state.last_seen_guid().is_none());
    }
}
