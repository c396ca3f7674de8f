//! Feed and entry types.

/// Maximum stored summary length in characters.
pub const MAX_SUMMARY_LENGTH: usize = 10000;

/// Maximum feed size in bytes (5MB).
pub const MAX_FEED_SIZE: u64 = 5 * 1024 * 1024;

/// A known feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feed {
    /// Short numeric id shown to chat users.
    pub id: i64,
    /// Feed URI (identity).
    pub uri: String,
    /// Display title from the last successful fetch.
    pub title: String,
    /// Unix time of the last successful refresh.
    pub last_refreshed: i64,
}

/// A stored feed entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Row id.
    pub id: i64,
    /// URI of the owning feed.
    pub feed_uri: String,
    /// Stable identifier within the feed (the entry link).
    pub key: String,
    /// Entry title.
    pub title: String,
    /// Entry link.
    pub link: String,
    /// Summary, possibly HTML, possibly empty.
    pub summary: String,
    /// Thumbnail image URI.
    pub thumbnail: Option<String>,
    /// Unix time of the last update, 0 if the feed gave none.
    pub last_updated: i64,
}

/// Entry data for insert-or-update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntry {
    pub feed_uri: String,
    pub key: String,
    pub title: String,
    pub link: String,
    pub summary: String,
    pub thumbnail: Option<String>,
    pub last_updated: i64,
}

impl NewEntry {
    /// Create an entry keyed by its link.
    pub fn new(
        feed_uri: impl Into<String>,
        link: impl Into<String>,
        title: impl Into<String>,
        last_updated: i64,
    ) -> Self {
        let link = link.into();
        Self {
            feed_uri: feed_uri.into(),
            key: link.clone(),
            title: title.into(),
            link,
            summary: String::new(),
            thumbnail: None,
            last_updated,
        }
    }

    /// Set the summary.
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    /// Set the thumbnail URI.
    pub fn with_thumbnail(mut self, thumbnail: impl Into<String>) -> Self {
        self.thumbnail = Some(thumbnail.into());
        self
    }
}

/// Undecoded response body of a feed fetch.
#[derive(Debug, Clone)]
pub struct RawDocument {
    /// URI the document was fetched from.
    pub uri: String,
    /// Response body.
    pub bytes: Vec<u8>,
}

/// A parsed, normalized feed document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFeed {
    /// Feed title.
    pub title: String,
    /// Entries in document order.
    pub entries: Vec<ParsedEntry>,
}

/// A normalized entry of a [`ParsedFeed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEntry {
    pub key: String,
    pub title: String,
    pub link: String,
    pub summary: String,
    pub thumbnail: Option<String>,
    /// Unix time, 0 if the source omitted it.
    pub updated: i64,
}

impl ParsedEntry {
    /// Convert into a storable entry of `feed_uri`.
    pub fn to_new_entry(&self, feed_uri: &str) -> NewEntry {
        NewEntry {
            feed_uri: feed_uri.to_string(),
            key: self.key.clone(),
            title: self.title.clone(),
            link: self.link.clone(),
            summary: self.summary.clone(),
            thumbnail: self.thumbnail.clone(),
            last_updated: self.updated,
        }
    }
}

impl ParsedFeed {
    /// All entries as storable rows of `feed_uri`.
    pub fn new_entries(&self, feed_uri: &str) -> Vec<NewEntry> {
        self.entries
            .iter()
            .map(|e| e.to_new_entry(feed_uri))
            .collect()
    }
}
