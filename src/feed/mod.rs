//! Feed module for feedbot.
//!
//! - Feed and entry storage
//! - Fetching and strict parsing of RSS/Atom documents

mod fetcher;
mod repository;
mod types;

pub use fetcher::{parse_document, validate_url, FeedFetcher, FeedSource};
pub(crate) use fetcher::truncate_chars;
pub use repository::FeedRepository;
pub use types::{
    Entry, Feed, NewEntry, ParsedEntry, ParsedFeed, RawDocument, MAX_FEED_SIZE,
    MAX_SUMMARY_LENGTH,
};
