//! In-memory doubles for the feed source and chat ports, shared by unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::chat::{ChatPort, OutboundMessage};
use crate::feed::{FeedSource, ParsedEntry, ParsedFeed};
use crate::{BotError, Result};

/// Failure kinds a [`StubSource`] can replay. `BotError` is not `Clone`.
#[derive(Clone)]
enum Failure {
    Fetch(String),
    Parse(String),
    Validation(String),
    Database(String),
}

impl Failure {
    fn from_error(error: BotError) -> Self {
        match error {
            BotError::Parse(m) => Failure::Parse(m),
            BotError::Validation(m) => Failure::Validation(m),
            BotError::Database(m) => Failure::Database(m),
            BotError::Fetch(m) => Failure::Fetch(m),
            other => Failure::Fetch(other.to_string()),
        }
    }

    fn to_error(&self) -> BotError {
        match self {
            Failure::Fetch(m) => BotError::Fetch(m.clone()),
            Failure::Parse(m) => BotError::Parse(m.clone()),
            Failure::Validation(m) => BotError::Validation(m.clone()),
            Failure::Database(m) => BotError::Database(m.clone()),
        }
    }
}

#[derive(Clone)]
enum Response {
    Feed(ParsedFeed),
    Fail(Failure),
}

/// Feed source answering from a per-URI table.
///
/// Unknown URIs fail with a fetch error.
#[derive(Default)]
pub struct StubSource {
    responses: Mutex<HashMap<String, Response>>,
    delays: Mutex<HashMap<String, Duration>>,
    calls: AtomicUsize,
}

impl StubSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `feed` for `uri`.
    pub fn set(&self, uri: &str, feed: ParsedFeed) {
        self.responses
            .lock()
            .unwrap()
            .insert(uri.to_string(), Response::Feed(feed));
    }

    /// Fail every fetch of `uri` with `error`.
    pub fn fail(&self, uri: &str, error: BotError) {
        self.responses
            .lock()
            .unwrap()
            .insert(uri.to_string(), Response::Fail(Failure::from_error(error)));
    }

    /// Sleep for `delay` before answering for `uri`.
    pub fn delay(&self, uri: &str, delay: Duration) {
        self.delays.lock().unwrap().insert(uri.to_string(), delay);
    }

    /// Number of fetches so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedSource for StubSource {
    async fn fetch_feed(&self, uri: &str) -> Result<ParsedFeed> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.delays.lock().unwrap().get(uri).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let response = self.responses.lock().unwrap().get(uri).cloned();
        match response {
            Some(Response::Feed(feed)) => Ok(feed),
            Some(Response::Fail(failure)) => Err(failure.to_error()),
            None => Err(BotError::Fetch(format!("no stub for {uri}"))),
        }
    }
}

/// Chat port that records every post.
#[derive(Default)]
pub struct RecordingChat {
    posts: Mutex<Vec<(String, OutboundMessage)>>,
    failing_groups: Mutex<HashSet<String>>,
}

impl RecordingChat {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject posts into `group_id` from now on.
    pub fn fail_group(&self, group_id: &str) {
        self.failing_groups
            .lock()
            .unwrap()
            .insert(group_id.to_string());
    }

    /// Messages posted into `group_id`, oldest first.
    pub fn messages(&self, group_id: &str) -> Vec<OutboundMessage> {
        self.posts
            .lock()
            .unwrap()
            .iter()
            .filter(|(group, _)| group == group_id)
            .map(|(_, message)| message.clone())
            .collect()
    }

    /// Texts of the messages posted into `group_id`.
    pub fn texts(&self, group_id: &str) -> Vec<String> {
        self.messages(group_id)
            .into_iter()
            .map(|message| message.text)
            .collect()
    }
}

#[async_trait]
impl ChatPort for RecordingChat {
    async fn post_to_group(&self, group_id: &str, message: &OutboundMessage) -> Result<()> {
        if self.failing_groups.lock().unwrap().contains(group_id) {
            return Err(BotError::Chat(format!("post to {group_id} rejected")));
        }
        self.posts
            .lock()
            .unwrap()
            .push((group_id.to_string(), message.clone()));
        Ok(())
    }
}

/// A parsed feed with `entries`.
pub fn parsed_feed(title: &str, entries: Vec<ParsedEntry>) -> ParsedFeed {
    ParsedFeed {
        title: title.to_string(),
        entries,
    }
}

/// A parsed entry keyed `key`, linking to `https://example.com/{key}`.
pub fn parsed_entry(key: &str, title: &str, updated: i64) -> ParsedEntry {
    ParsedEntry {
        key: key.to_string(),
        title: title.to_string(),
        link: format!("https://example.com/{key}"),
        summary: String::new(),
        thumbnail: None,
        updated,
    }
}
