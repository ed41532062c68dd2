//! Event types delivered through the [`EventBus`](super::EventBus).

use crate::feed::FeedEntry;
use crate::FeedwatchError;

/// Kind of feed event, used to pick which handlers receive it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// New entries were detected.
    NewItems,
    /// A poll failed to fetch the feed.
    Error,
    /// A poller began watching the feed.
    Started,
}

impl EventKind {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::NewItems => "new-items",
            EventKind::Error => "error",
            EventKind::Started => "started",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An event published by a change detector or its poller.
#[derive(Debug)]
pub enum FeedEvent {
    /// Entries newer than the previous baseline, newest first.
    NewItems(Vec<FeedEntry>),
    /// The failure that ended a poll cycle.
    Error(FeedwatchError),
    /// Polling started for the named feed.
    Started { name: String, url: String },
}

impl FeedEvent {
    /// The kind tag of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            FeedEvent::NewItems(_) => EventKind::NewItems,
            FeedEvent::Error(_) => EventKind::Error,
            FeedEvent::Started { .. } => EventKind::Started,
        }
    }
}
