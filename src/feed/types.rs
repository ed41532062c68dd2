//! Feed types for feedwatch.

use chrono::{DateTime, Utc};

/// One item of a feed as seen by a single fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedEntry {
    /// Feed-assigned identifier (RSS `guid`, Atom `id`).
    pub guid: Option<String>,
    /// Entry title.
    pub title: Option<String>,
    /// Link to the entry.
    pub link: Option<String>,
    /// Author name.
    pub author: Option<String>,
    /// Publication (or last update) time.
    pub published_at: Option<DateTime<Utc>>,
}

impl FeedEntry {
    /// Create an entry with the given GUID.
    pub fn new(guid: impl Into<String>) -> Self {
        Self {
            guid: Some(guid.into()),
            ..Self::default()
        }
    }

    /// Set the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the link.
    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    /// Set the author.
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Set the publication time.
    pub fn with_published_at(mut self, published_at: DateTime<Utc>) -> Self {
        self.published_at = Some(published_at);
        self
    }

    /// The GUID, if present and not blank.
    pub fn usable_guid(&self) -> Option<&str> {
        self.guid.as_deref().filter(|g| !g.trim().is_empty())
    }
}
