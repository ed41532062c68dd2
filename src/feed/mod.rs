//! Feed watching for feedwatch.
//!
//! This module provides feed retrieval, change detection and periodic polling.

pub mod detector;
pub mod fetcher;
pub mod poller;
pub mod types;

pub use detector::{entries_before, ChangeDetector, FeedState, PollOutcome};
pub use fetcher::{parse_feed, validate_url, FeedSource, HttpFeedSource};
pub use poller::{FeedPoller, PollerHandle, DEFAULT_POLL_INTERVAL_SECS};
pub use types::FeedEntry;
