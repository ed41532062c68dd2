//! Feed retrieval.
//!
//! [`FeedSource`] is the seam between change detection and the network.
//! [`HttpFeedSource`] fetches over HTTP(S) with timeouts, a size cap and
//! SSRF checks, and parses RSS/Atom with `feed-rs`.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use feed_rs::parser;
use reqwest::Client;
use tracing::debug;

use crate::config::FetchConfig;
use crate::error::{FeedwatchError, Result};
use crate::feed::types::FeedEntry;

/// Produces the current entries of a feed, newest first.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch and parse the feed at `url`, preserving the feed's own order.
    async fn fetch(&self, url: &str) -> Result<Vec<FeedEntry>>;
}

#[async_trait]
impl<T: FeedSource + ?Sized> FeedSource for Arc<T> {
    async fn fetch(&self, url: &str) -> Result<Vec<FeedEntry>> {
        (**self).fetch(url).await
    }
}

/// HTTP(S) feed source.
#[derive(Debug, Clone)]
pub struct HttpFeedSource {
    client: Client,
    max_feed_size: u64,
    allow_private_hosts: bool,
}

impl HttpFeedSource {
    /// Create a source from fetch settings.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .read_timeout(Duration::from_secs(config.read_timeout_secs))
            .timeout(Duration::from_secs(config.total_timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| FeedwatchError::Fetch(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            max_feed_size: config.max_feed_size_bytes,
            allow_private_hosts: config.allow_private_hosts,
        })
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch(&self, url: &str) -> Result<Vec<FeedEntry>> {
        // Validate URL for SSRF
        validate_url(url, self.allow_private_hosts)?;

        // Fetch the feed
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FeedwatchError::Fetch(format!("failed to fetch feed: {}", e)))?;

        // Check response status
        if !response.status().is_success() {
            return Err(FeedwatchError::Fetch(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        // Check content length if available
        if let Some(content_length) = response.content_length() {
            if content_length > self.max_feed_size {
                return Err(too_large(content_length, self.max_feed_size));
            }
        }

        // Read body
        let bytes = response
            .bytes()
            .await
            .map_err(|e| FeedwatchError::Fetch(format!("failed to read response: {}", e)))?;

        // Check actual size
        if bytes.len() as u64 > self.max_feed_size {
            return Err(too_large(bytes.len() as u64, self.max_feed_size));
        }

        // Parse the feed
        let entries = parse_feed(&bytes)?;
        debug!(url, bytes = bytes.len(), entries = entries.len(), "fetched feed");
        Ok(entries)
    }
}

fn too_large(size: u64, max: u64) -> FeedwatchError {
    FeedwatchError::Fetch(format!(
        "feed too large: {} bytes (max {} bytes)",
        size, max
    ))
}

/// Validate a feed URL before requesting it.
///
/// Only http and https are accepted. Unless `allow_private_hosts` is set,
/// loopback, private and reserved hosts are rejected.
pub fn validate_url(url: &str, allow_private_hosts: bool) -> Result<()> {
    let parsed = url::Url::parse(url)
        .map_err(|e| FeedwatchError::InvalidUrl(format!("{}: {}", url, e)))?;

    // Check scheme
    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(FeedwatchError::InvalidUrl(format!(
                "unsupported URL scheme: {}",
                scheme
            )));
        }
    }

    let host = parsed
        .host()
        .ok_or_else(|| FeedwatchError::InvalidUrl("URL has no host".to_string()))?;

    if allow_private_hosts {
        return Ok(());
    }

    let ip = match host {
        url::Host::Domain(domain) => {
            // Check for forbidden hostnames
            if is_forbidden_hostname(domain) {
                return Err(FeedwatchError::InvalidUrl(format!(
                    "forbidden host: {}",
                    domain
                )));
            }
            return Ok(());
        }
        url::Host::Ipv4(ipv4) => IpAddr::V4(ipv4),
        url::Host::Ipv6(ipv6) => IpAddr::V6(ipv6),
    };

    if is_private_ip(&ip) {
        return Err(FeedwatchError::InvalidUrl(format!(
            "private IP address not allowed: {}",
            ip
        )));
    }
    Ok(())
}

fn is_forbidden_hostname(host: &str) -> bool {
    const FORBIDDEN_SUFFIXES: [&str; 7] = [
        ".local",
        ".localhost",
        ".internal",
        ".intranet",
        ".corp",
        ".home",
        ".lan",
    ];

    let host = host.to_lowercase();
    host == "localhost" || FORBIDDEN_SUFFIXES.iter().any(|s| host.ends_with(s))
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                || v4.is_documentation()
        }
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                // fc00::/7 unique local
                || (first & 0xfe00) == 0xfc00
                // fe80::/10 link-local
                || (first & 0xffc0) == 0xfe80
        }
    }
}

/// Parse an RSS or Atom document into entries, keeping document order.
///
/// Entries without an id in the document get `guid: None`.
pub fn parse_feed(bytes: &[u8]) -> Result<Vec<FeedEntry>> {
    // feed-rs synthesizes ids by default; an empty one keeps "absent" observable
    let feed = parser::Builder::new()
        .id_generator(|_, _, _| String::new())
        .build()
        .parse(bytes)
        .map_err(|e| FeedwatchError::Parse(format!("failed to parse feed: {}", e)))?;

    let entries = feed
        .entries
        .into_iter()
        .map(|entry| FeedEntry {
            guid: Some(entry.id).filter(|id| !id.trim().is_empty()),
            title: entry.title.map(|t| t.content),
            link: entry.links.first().map(|l| l.href.clone()),
            author: entry.authors.first().map(|a| a.name.clone()),
            published_at: entry.published.or(entry.updated),
        })
        .collect();

    Ok(entries)
}
