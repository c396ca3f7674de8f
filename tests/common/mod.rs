//! Test helpers for integration tests.
//!
//! Provides an in-memory feed source, a recording chat port and a harness
//! that wires them to a fresh database.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use feedbot::bot::{CommandHandler, CommandRouter, CommandSet, HandlerSettings};
use feedbot::chat::{ChatPort, IncomingPost, OutboundMessage};
use feedbot::feed::{FeedSource, ParsedEntry, ParsedFeed};
use feedbot::{BotError, Database, RefreshScheduler, Result, SchedulerSettings};

/// Default timeout for waiting on background work.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Bot identity used by the harness.
pub const BOT_ID: &str = "bot-1";

/// Feed source serving canned documents per URI.
#[derive(Default)]
pub struct StubSource {
    feeds: Mutex<HashMap<String, ParsedFeed>>,
    failures: Mutex<HashMap<String, String>>,
    calls: AtomicUsize,
}

impl StubSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, uri: &str, feed: ParsedFeed) {
        self.failures.lock().unwrap().remove(uri);
        self.feeds.lock().unwrap().insert(uri.to_string(), feed);
    }

    /// Make fetches of `uri` fail with a fetch error.
    pub fn fail(&self, uri: &str, message: &str) {
        self.feeds.lock().unwrap().remove(uri);
        self.failures
            .lock()
            .unwrap()
            .insert(uri.to_string(), message.to_string());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedSource for StubSource {
    async fn fetch_feed(&self, uri: &str) -> Result<ParsedFeed> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.failures.lock().unwrap().get(uri) {
            return Err(BotError::Fetch(message.clone()));
        }
        self.feeds
            .lock()
            .unwrap()
            .get(uri)
            .cloned()
            .ok_or_else(|| BotError::Fetch(format!("HTTP error: 404 Not Found ({uri})")))
    }
}

/// Chat port remembering every post.
#[derive(Default)]
pub struct RecordingChat {
    posts: Mutex<Vec<(String, OutboundMessage)>>,
}

impl RecordingChat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self, group_id: &str) -> Vec<OutboundMessage> {
        self.posts
            .lock()
            .unwrap()
            .iter()
            .filter(|(group, _)| group == group_id)
            .map(|(_, message)| message.clone())
            .collect()
    }

    pub fn texts(&self, group_id: &str) -> Vec<String> {
        self.messages(group_id).into_iter().map(|m| m.text).collect()
    }

    pub fn total(&self) -> usize {
        self.posts.lock().unwrap().len()
    }

    /// Wait until `group_id` has received at least `count` messages.
    pub async fn wait_for(&self, group_id: &str, count: usize) -> Vec<OutboundMessage> {
        let deadline = tokio::time::Instant::now() + DEFAULT_TIMEOUT;
        loop {
            let messages = self.messages(group_id);
            if messages.len() >= count || tokio::time::Instant::now() >= deadline {
                return messages;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

#[async_trait]
impl ChatPort for RecordingChat {
    async fn post_to_group(&self, group_id: &str, message: &OutboundMessage) -> Result<()> {
        self.posts
            .lock()
            .unwrap()
            .push((group_id.to_string(), message.clone()));
        Ok(())
    }
}

/// A fresh bot wired to in-memory doubles.
pub struct Harness {
    pub db: Database,
    pub source: Arc<StubSource>,
    pub chat: Arc<RecordingChat>,
    pub router: Arc<CommandRouter>,
    pub scheduler: RefreshScheduler,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_settings(SchedulerSettings {
            refresh_period: Duration::from_secs(10),
            push_period: Duration::from_secs(10),
            max_concurrency: 4,
        })
        .await
    }

    pub async fn with_settings(settings: SchedulerSettings) -> Self {
        let db = Database::open_in_memory().await.unwrap();
        let source = Arc::new(StubSource::new());
        let chat = Arc::new(RecordingChat::new());

        let handler = CommandHandler::new(
            db.clone(),
            source.clone(),
            chat.clone(),
            HandlerSettings::default(),
        );
        let router = CommandRouter::new(CommandSet::standard("rss").unwrap(), handler)
            .with_bot_id(BOT_ID);
        let scheduler = RefreshScheduler::new(db.clone(), source.clone(), chat.clone(), settings);

        Self {
            db,
            source,
            chat,
            router: Arc::new(router),
            scheduler,
        }
    }

    /// Send `text` as user `u1` in `group_id`.
    pub async fn say(&self, group_id: &str, text: &str) {
        self.router
            .handle(IncomingPost::new("u1", group_id, text))
            .await;
    }
}

pub fn feed(title: &str, entries: Vec<ParsedEntry>) -> ParsedFeed {
    ParsedFeed {
        title: title.to_string(),
        entries,
    }
}

/// An entry keyed by its link `https://example.com/{slug}`.
pub fn entry(slug: &str, title: &str, updated: i64) -> ParsedEntry {
    let link = format!("https://example.com/{slug}");
    ParsedEntry {
        key: link.clone(),
        title: title.to_string(),
        link,
        summary: String::new(),
        thumbnail: None,
        updated,
    }
}
