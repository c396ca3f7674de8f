//! Feed fetcher with security measures.
//!
//! Retrieval ([`FeedFetcher::fetch`]) and parsing ([`parse_document`]) are
//! separate steps; [`FeedSource`] combines them for the command handlers and
//! the refresh scheduler.

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use feed_rs::parser;
use reqwest::Client;
use tracing::debug;

use crate::config::FeedsConfig;
use crate::error::{BotError, Result};
use crate::feed::types::{ParsedEntry, ParsedFeed, RawDocument, MAX_SUMMARY_LENGTH};

/// Anything that can turn a feed URI into a parsed feed.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch and strictly parse the feed at `uri`.
    async fn fetch_feed(&self, uri: &str) -> Result<ParsedFeed>;
}

/// HTTP feed fetcher.
pub struct FeedFetcher {
    client: Client,
    max_feed_size: u64,
    allow_private_hosts: bool,
}

impl FeedFetcher {
    /// Create a fetcher from the feed configuration.
    pub fn new(config: &FeedsConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.total_timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| BotError::Fetch(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            max_feed_size: config.max_feed_size_bytes,
            allow_private_hosts: config.allow_private_hosts,
        })
    }

    /// Retrieve the raw document at `uri`.
    ///
    /// Fails with [`BotError::Fetch`] on network failure, timeout, a non-2xx
    /// status, or a body larger than the configured limit.
    pub async fn fetch(&self, uri: &str) -> Result<RawDocument> {
        if !self.allow_private_hosts {
            validate_url(uri)?;
        }

        let mut response = self.client.get(uri).send().await.map_err(|e| {
            if e.is_timeout() {
                BotError::Fetch(format!("timed out fetching {uri}"))
            } else {
                BotError::Fetch(format!("failed to fetch {uri}: {e}"))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(BotError::Fetch(format!("HTTP error: {status}")));
        }

        if let Some(content_length) = response.content_length() {
            if content_length > self.max_feed_size {
                return Err(self.too_large(content_length));
            }
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| BotError::Fetch(format!("failed to read response: {e}")))?
        {
            if (bytes.len() + chunk.len()) as u64 > self.max_feed_size {
                return Err(self.too_large((bytes.len() + chunk.len()) as u64));
            }
            bytes.extend_from_slice(&chunk);
        }

        debug!(feed_uri = %uri, size = bytes.len(), "fetched feed document");
        Ok(RawDocument {
            uri: uri.to_string(),
            bytes,
        })
    }

    fn too_large(&self, size: u64) -> BotError {
        BotError::Fetch(format!(
            "feed too large: {} bytes (max {} bytes)",
            size, self.max_feed_size
        ))
    }
}

#[async_trait]
impl FeedSource for FeedFetcher {
    async fn fetch_feed(&self, uri: &str) -> Result<ParsedFeed> {
        let document = self.fetch(uri).await?;
        parse_document(&document)
    }
}

/// Validate a URL for SSRF protection.
///
/// This function checks that:
/// - The URL uses http or https scheme
/// - The host is not a private/loopback address
/// - The host is not a reserved hostname
pub fn validate_url(url: &str) -> Result<()> {
    let parsed =
        url::Url::parse(url).map_err(|e| BotError::Validation(format!("invalid URL: {e}")))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(BotError::Validation(format!(
                "unsupported URL scheme: {scheme}"
            )));
        }
    }

    let host = parsed
        .host()
        .ok_or_else(|| BotError::Validation("URL has no host".to_string()))?;

    let ip = match host {
        url::Host::Domain(domain) => {
            if is_forbidden_hostname(domain) {
                return Err(BotError::Validation(format!("forbidden host: {domain}")));
            }
            return Ok(());
        }
        url::Host::Ipv4(ipv4) => IpAddr::V4(ipv4),
        url::Host::Ipv6(ipv6) => IpAddr::V6(ipv6),
    };

    if is_private_ip(&ip) {
        return Err(BotError::Validation(format!(
            "private IP address not allowed: {ip}"
        )));
    }
    Ok(())
}

fn is_forbidden_hostname(host: &str) -> bool {
    const FORBIDDEN_SUFFIXES: &[&str] = &[
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
        IpAddr::V4(ipv4) => {
            let o = ipv4.octets();
            ipv4.is_loopback()
                || ipv4.is_private()
                || ipv4.is_link_local()
                || ipv4.is_broadcast()
                || ipv4.is_unspecified()
                // Documentation: 192.0.2.0/24, 198.51.100.0/24, 203.0.113.0/24
                || (o[0] == 192 && o[1] == 0 && o[2] == 2)
                || (o[0] == 198 && o[1] == 51 && o[2] == 100)
                || (o[0] == 203 && o[1] == 0 && o[2] == 113)
        }
        IpAddr::V6(ipv6) => {
            let first = ipv6.segments()[0];
            ipv6.is_loopback()
                || ipv6.is_unspecified()
                // Unique local fc00::/7, link-local fe80::/10
                || (first & 0xfe00) == 0xfc00
                || (first & 0xffc0) == 0xfe80
        }
    }
}

/// Parse a raw document into a normalized feed.
///
/// Parsing is strict: besides syntax errors, a document without a feed title
/// or with an entry that has no link is rejected, since such a feed cannot be
/// stored reliably.
pub fn parse_document(document: &RawDocument) -> Result<ParsedFeed> {
    let feed = parser::parse(document.bytes.as_slice())
        .map_err(|e| BotError::Parse(format!("{}: {e}", document.uri)))?;

    let title = feed
        .title
        .map(|t| t.content.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| BotError::Parse(format!("{}: feed has no title", document.uri)))?;

    let mut entries = Vec::with_capacity(feed.entries.len());
    for (position, entry) in feed.entries.into_iter().enumerate() {
        let link = entry
            .links
            .first()
            .map(|l| l.href.trim().to_string())
            .filter(|l| !l.is_empty())
            .ok_or_else(|| {
                BotError::Parse(format!(
                    "{}: entry {} has no link",
                    document.uri,
                    position + 1
                ))
            })?;

        let title = entry
            .title
            .map(|t| t.content)
            .unwrap_or_else(|| "Untitled".to_string());
        let summary = entry
            .summary
            .map(|t| t.content)
            .or_else(|| entry.content.and_then(|c| c.body))
            .map(|s| truncate_chars(&s, MAX_SUMMARY_LENGTH))
            .unwrap_or_default();
        let thumbnail = entry
            .media
            .iter()
            .flat_map(|m| m.thumbnails.iter())
            .map(|t| t.image.uri.clone())
            .next();
        let updated = entry
            .updated
            .or(entry.published)
            .map(|t| t.timestamp())
            .unwrap_or(0);

        entries.push(ParsedEntry {
            key: link.clone(),
            title,
            link,
            summary,
            thumbnail,
            updated,
        });
    }

    Ok(ParsedFeed { title, entries })
}

/// Truncate to at most `max` characters.
pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
