//! Command execution.

use std::sync::Arc;

use chrono::Utc;
use regex::RegexBuilder;
use tracing::{info, warn};

use super::command::{format_help, Command};
use super::format::{render_search_results, render_subscription_list, strip_html};
use crate::chat::{ChatPort, IncomingPost};
use crate::db::Database;
use crate::feed::{Entry, FeedRepository, FeedSource, ParsedFeed};
use crate::subscription::{SubscriptionFilter, SubscriptionRepository};
use crate::Result;

/// Reply sent when storage fails while handling a command.
pub const GENERIC_FAILURE_REPLY: &str = "Sorry, something went wrong. Please try again later.";

/// Compiled search patterns are capped to this size.
const SEARCH_REGEX_SIZE_LIMIT: usize = 1 << 20;

/// Settings for [`CommandHandler`].
#[derive(Debug, Clone)]
pub struct HandlerSettings {
    /// Command prefix shown in help.
    pub prefix: String,
    /// A new subscription starts this many seconds in the past.
    pub backlog_window_secs: i64,
    /// Maximum number of search hits returned.
    pub max_search_results: usize,
}

impl Default for HandlerSettings {
    fn default() -> Self {
        Self {
            prefix: "rss".to_string(),
            backlog_window_secs: 24 * 60 * 60,
            max_search_results: 10,
        }
    }
}

/// Executes parsed commands against the stores and replies in the chat.
pub struct CommandHandler {
    db: Database,
    source: Arc<dyn FeedSource>,
    chat: Arc<dyn ChatPort>,
    settings: HandlerSettings,
}

impl CommandHandler {
    pub fn new(
        db: Database,
        source: Arc<dyn FeedSource>,
        chat: Arc<dyn ChatPort>,
        settings: HandlerSettings,
    ) -> Self {
        Self {
            db,
            source,
            chat,
            settings,
        }
    }

    /// Execute `command` for `post`.
    ///
    /// Storage failures are answered with [`GENERIC_FAILURE_REPLY`] and
    /// returned; feed failures during subscribe are answered by
    /// [`Self::subscribe`] itself.
    pub async fn execute(&self, post: &IncomingPost, command: Command) -> Result<()> {
        let group_id = post.group_id.as_str();
        let result = match command {
            Command::Help => self.help(group_id).await,
            Command::List => self.list(group_id).await,
            Command::Subscribe { uri } => self.subscribe(group_id, &uri).await,
            Command::Unsubscribe { feed_id } => self.unsubscribe(group_id, feed_id).await,
            Command::Search { feed_id, pattern } => self.search(group_id, feed_id, &pattern).await,
        };

        if let Err(ref e) = result {
            if e.is_storage() {
                if let Err(reply_err) = self.chat.reply(group_id, GENERIC_FAILURE_REPLY).await {
                    warn!(group_id = %group_id, "Failed to send failure reply: {}", reply_err);
                }
            }
        }
        result
    }

    async fn help(&self, group_id: &str) -> Result<()> {
        self.chat
            .reply(group_id, &format_help(&self.settings.prefix))
            .await
    }

    async fn list(&self, group_id: &str) -> Result<()> {
        let subscriptions = SubscriptionRepository::new(self.db.pool())
            .list(&SubscriptionFilter::new().group(group_id).eager())
            .await?;
        self.chat
            .post_to_group(group_id, &render_subscription_list(&subscriptions))
            .await
    }

    /// Fetch and validate `uri`, store it, and subscribe the group.
    ///
    /// A feed that fails to fetch or parse is never stored.
    pub async fn subscribe(&self, group_id: &str, uri: &str) -> Result<()> {
        let parsed = match self.source.fetch_feed(uri).await {
            Ok(parsed) => parsed,
            Err(e) if e.is_storage() => return Err(e),
            Err(e) => {
                warn!(group_id = %group_id, feed_uri = %uri, "Subscribe rejected: {}", e);
                if let Err(reply_err) = self
                    .chat
                    .reply(group_id, &format!("Failed to subscribe feed {uri} !"))
                    .await
                {
                    warn!(group_id = %group_id, "Failed to send reply: {}", reply_err);
                }
                return Err(e);
            }
        };

        let created = self.store_subscription(group_id, uri, &parsed).await?;
        let reply = if created {
            info!(group_id = %group_id, feed_uri = %uri, "Subscribed");
            format!("Successfully subscribe feed {uri} !")
        } else {
            format!("Already subscribed feed {uri} !")
        };
        self.chat.reply(group_id, &reply).await
    }

    async fn store_subscription(&self, group_id: &str, uri: &str, parsed: &ParsedFeed) -> Result<bool> {
        let now = Utc::now().timestamp();
        let feeds = FeedRepository::new(self.db.pool());
        feeds.upsert_feed(uri, &parsed.title, now).await?;
        feeds.upsert_entries(&parsed.new_entries(uri)).await?;

        let (_, created) = SubscriptionRepository::new(self.db.pool())
            .get_or_create(group_id, uri, now - self.settings.backlog_window_secs)
            .await?;
        Ok(created)
    }

    async fn unsubscribe(&self, group_id: &str, feed_id: i64) -> Result<()> {
        let feed = FeedRepository::new(self.db.pool()).get_by_id(feed_id).await?;
        let deleted = match &feed {
            Some(feed) => {
                SubscriptionRepository::new(self.db.pool())
                    .delete(group_id, &feed.uri)
                    .await?
            }
            None => false,
        };

        let reply = match feed {
            Some(feed) if deleted => {
                info!(group_id = %group_id, feed_uri = %feed.uri, "Unsubscribed");
                format!("Successfully unsubscribe feed {} !", feed.uri)
            }
            _ => format!("Failed to unsubscribe feed {feed_id} : not subscribed"),
        };
        self.chat.reply(group_id, &reply).await
    }

    async fn search(&self, group_id: &str, feed_id: Option<i64>, pattern: &str) -> Result<()> {
        let regex = match RegexBuilder::new(pattern)
            .case_insensitive(true)
            .size_limit(SEARCH_REGEX_SIZE_LIMIT)
            .build()
        {
            Ok(regex) => regex,
            Err(_) => {
                return self
                    .chat
                    .reply(group_id, &format!("Invalid search pattern: `{pattern}`"))
                    .await;
            }
        };

        let mut filter = SubscriptionFilter::new().group(group_id);
        if let Some(id) = feed_id {
            filter = filter.feed_id(id);
        }
        let subscriptions = SubscriptionRepository::new(self.db.pool())
            .list(&filter)
            .await?;

        if subscriptions.is_empty() {
            let reply = match feed_id {
                Some(id) => format!("This chat is not subscribed to feed {id}."),
                None => "This chat has no subscriptions yet.".to_string(),
            };
            return self.chat.reply(group_id, &reply).await;
        }

        let feeds = FeedRepository::new(self.db.pool());
        let mut hits: Vec<Entry> = Vec::new();
        for sub in &subscriptions {
            let entries = feeds.get_entries(&sub.feed_uri, None).await?;
            hits.extend(entries.into_iter().filter(|e| {
                regex.is_match(&e.title) || regex.is_match(&strip_html(&e.summary))
            }));
        }
        hits.sort_by(|a, b| b.last_updated.cmp(&a.last_updated).then(a.id.cmp(&b.id)));
        hits.truncate(self.settings.max_search_results);

        self.chat
            .post_to_group(group_id, &render_search_results(pattern, &hits))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{parsed_feed, parsed_entry, RecordingChat, StubSource};
    use crate::BotError;

    const URI: &str = "http://example.com/feed.xml";

    struct Fixture {
        db: Database,
        source: Arc<StubSource>,
        chat: Arc<RecordingChat>,
        handler: CommandHandler,
    }

    async fn fixture() -> Fixture {
        let db = Database::open_in_memory().await.unwrap();
        let source = Arc::new(StubSource::new());
        let chat = Arc::new(RecordingChat::new());
        let handler = CommandHandler::new(
            db.clone(),
            source.clone(),
            chat.clone(),
            HandlerSettings::default(),
        );
        Fixture {
            db,
            source,
            chat,
            handler,
        }
    }

    fn post() -> IncomingPost {
        IncomingPost::new("u1", "g1", "")
    }

    #[tokio::test]
    async fn test_subscribe_success() {
        let f = fixture().await;
        let now = Utc::now().timestamp();
        f.source.set(
            URI,
            parsed_feed("Example", vec![parsed_entry("e1", "First", now - 60)]),
        );

        f.handler
            .execute(&post(), Command::Subscribe { uri: URI.to_string() })
            .await
            .unwrap();

        assert_eq!(
            f.chat.texts("g1"),
            vec![format!("Successfully subscribe feed {URI} !")]
        );

        let feed = FeedRepository::new(f.db.pool())
            .get_by_uri(URI)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(feed.title, "Example");
        assert_eq!(FeedRepository::new(f.db.pool()).count_entries(URI).await.unwrap(), 1);

        let sub = SubscriptionRepository::new(f.db.pool())
            .get("g1", URI)
            .await
            .unwrap()
            .unwrap();
        let expected = now - 24 * 60 * 60;
        assert!((sub.watermark - expected).abs() <= 2, "watermark {}", sub.watermark);
    }

    #[tokio::test]
    async fn test_subscribe_twice_reports_already_subscribed() {
        let f = fixture().await;
        f.source.set(URI, parsed_feed("Example", vec![]));

        let cmd = Command::Subscribe { uri: URI.to_string() };
        f.handler.execute(&post(), cmd.clone()).await.unwrap();
        let subs = SubscriptionRepository::new(f.db.pool());
        let before = subs.get("g1", URI).await.unwrap().unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
        f.handler.execute(&post(), cmd).await.unwrap();

        let after = subs.get("g1", URI).await.unwrap().unwrap();
        assert_eq!(before, after);
        assert_eq!(subs.list(&SubscriptionFilter::new()).await.unwrap().len(), 1);
        assert_eq!(
            f.chat.texts("g1").last().unwrap(),
            &format!("Already subscribed feed {URI} !")
        );
    }

    #[tokio::test]
    async fn test_subscribe_failure_stores_nothing() {
        let f = fixture().await;
        f.source.fail(URI, BotError::Fetch("HTTP error: 404 Not Found".to_string()));

        let result = f
            .handler
            .execute(&post(), Command::Subscribe { uri: URI.to_string() })
            .await;

        assert!(matches!(result, Err(BotError::Fetch(_))));
        assert_eq!(f.chat.texts("g1"), vec![format!("Failed to subscribe feed {URI} !")]);
        assert!(FeedRepository::new(f.db.pool())
            .get_by_uri(URI)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_subscribe_parse_failure_names_uri() {
        let f = fixture().await;
        f.source.fail(URI, BotError::Parse("feed has no title".to_string()));

        let result = f.handler.subscribe("g1", URI).await;
        assert!(matches!(result, Err(BotError::Parse(_))));
        assert!(f.chat.texts("g1")[0].contains(URI));
    }

    #[tokio::test]
    async fn test_list() {
        let f = fixture().await;
        f.source.set(URI, parsed_feed("Example", vec![]));
        f.handler.subscribe("g1", URI).await.unwrap();

        f.handler.execute(&post(), Command::List).await.unwrap();

        let reply = f.chat.texts("g1").pop().unwrap();
        assert!(reply.starts_with("Subscribed feeds (1):"));
        assert!(reply.contains("Example - http://example.com/feed.xml"));
    }

    #[tokio::test]
    async fn test_unsubscribe() {
        let f = fixture().await;
        f.source.set(URI, parsed_feed("Example", vec![]));
        f.handler.subscribe("g1", URI).await.unwrap();
        let feed_id = FeedRepository::new(f.db.pool())
            .get_by_uri(URI)
            .await
            .unwrap()
            .unwrap()
            .id;

        f.handler
            .execute(&post(), Command::Unsubscribe { feed_id })
            .await
            .unwrap();
        f.handler
            .execute(&post(), Command::Unsubscribe { feed_id })
            .await
            .unwrap();

        let texts = f.chat.texts("g1");
        assert_eq!(texts[1], format!("Successfully unsubscribe feed {URI} !"));
        assert!(texts[2].starts_with(&format!("Failed to unsubscribe feed {feed_id}")));
        assert!(SubscriptionRepository::new(f.db.pool())
            .get("g1", URI)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_unsubscribe_unknown_feed() {
        let f = fixture().await;
        f.handler
            .execute(&post(), Command::Unsubscribe { feed_id: 42 })
            .await
            .unwrap();
        assert!(f.chat.texts("g1")[0].starts_with("Failed to unsubscribe feed 42"));
    }

    #[tokio::test]
    async fn test_search_scoping() {
        let f = fixture().await;
        let other = "http://example.org/other.xml";
        let mut summarized = parsed_entry("a2", "Weekly notes", 2);
        summarized.summary = "<p>All about RUST macros</p>".to_string();
        f.source.set(
            URI,
            parsed_feed("Example", vec![parsed_entry("a1", "Rust 2.0 released", 1), summarized]),
        );
        f.source.set(
            other,
            parsed_feed("Other", vec![parsed_entry("b1", "rusty bikes", 3)]),
        );
        f.handler.subscribe("g1", URI).await.unwrap();
        f.handler.subscribe("g1", other).await.unwrap();
        let other_id = FeedRepository::new(f.db.pool())
            .get_by_uri(other)
            .await
            .unwrap()
            .unwrap()
            .id;

        // All subscribed feeds, title or summary, case-insensitive
        f.handler
            .search("g1", None, "rust")
            .await
            .unwrap();
        let all = f.chat.messages("g1").pop().unwrap();
        assert_eq!(all.attachments.len(), 3);
        // Newest first
        assert!(all.attachments[0].title.contains("rusty bikes"));

        // One feed only
        f.handler.search("g1", Some(other_id), "RUST").await.unwrap();
        let scoped = f.chat.messages("g1").pop().unwrap();
        assert_eq!(scoped.attachments.len(), 1);
        assert!(scoped.attachments[0].title.contains("rusty bikes"));

        f.handler.search("g1", None, "python").await.unwrap();
        let none = f.chat.messages("g1").pop().unwrap();
        assert_eq!(none.text, "No entries match `python`.");
    }

    #[tokio::test]
    async fn test_search_other_groups_feeds_excluded() {
        let f = fixture().await;
        f.source.set(URI, parsed_feed("Example", vec![parsed_entry("a1", "Rust", 1)]));
        f.handler.subscribe("g2", URI).await.unwrap();

        f.handler.search("g1", None, "rust").await.unwrap();
        assert_eq!(
            f.chat.texts("g1"),
            vec!["This chat has no subscriptions yet.".to_string()]
        );
    }

    #[tokio::test]
    async fn test_search_ignores_markup() {
        let f = fixture().await;
        let mut linked = parsed_entry("a1", "Weekly notes", 1);
        linked.summary = r#"<p>Read the <a href="https://example.com/x">release notes</a></p>"#.to_string();
        f.source.set(URI, parsed_feed("Example", vec![linked]));
        f.handler.subscribe("g1", URI).await.unwrap();

        f.handler.search("g1", None, "href").await.unwrap();
        assert_eq!(f.chat.messages("g1").pop().unwrap().text, "No entries match `href`.");

        f.handler.search("g1", None, "the release").await.unwrap();
        assert_eq!(f.chat.messages("g1").pop().unwrap().attachments.len(), 1);
    }

    #[tokio::test]
    async fn test_search_invalid_pattern() {
        let f = fixture().await;
        f.handler
            .execute(
                &post(),
                Command::Search {
                    feed_id: None,
                    pattern: "(unclosed".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(f.chat.texts("g1"), vec!["Invalid search pattern: `(unclosed`".to_string()]);
    }

    #[tokio::test]
    async fn test_storage_error_gets_generic_reply() {
        let f = fixture().await;
        f.db.pool().close().await;

        let result = f.handler.execute(&post(), Command::List).await;
        assert!(matches!(result, Err(BotError::Database(_))));
        assert_eq!(f.chat.texts("g1"), vec![GENERIC_FAILURE_REPLY.to_string()]);
    }

    #[tokio::test]
    async fn test_help() {
        let f = fixture().await;
        f.handler.execute(&post(), Command::Help).await.unwrap();
        assert!(f.chat.texts("g1")[0].contains("rss subscribe"));
    }
}
