//! feedwatch - feed change detection.
//!
//! Polls RSS/Atom feeds at a fixed interval and notifies subscribers of the
//! entries published since the previous poll.

pub mod config;
pub mod error;
pub mod event;
pub mod feed;
pub mod logging;

pub use config::Config;
pub use error::{FeedwatchError, Result};
pub use event::{EventBus, EventKind, FeedEvent, SubscriptionId};
pub use feed::{
    ChangeDetector, FeedEntry, FeedPoller, FeedSource, FeedState, HttpFeedSource, PollOutcome,
    PollerHandle,
};
