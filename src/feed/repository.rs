//! Feed and entry storage.

use super::types::{Entry, Feed, NewEntry};
use crate::db::DbPool;
use crate::Result;

/// Row type for a feed.
#[derive(Debug, Clone, sqlx::FromRow)]
struct FeedRow {
    id: i64,
    uri: String,
    title: String,
    last_refreshed: i64,
}

impl From<FeedRow> for Feed {
    fn from(row: FeedRow) -> Self {
        Feed {
            id: row.id,
            uri: row.uri,
            title: row.title,
            last_refreshed: row.last_refreshed,
        }
    }
}

/// Row type for an entry.
#[derive(Debug, Clone, sqlx::FromRow)]
struct EntryRow {
    id: i64,
    feed_uri: String,
    key: String,
    title: String,
    link: String,
    summary: String,
    thumbnail: Option<String>,
    last_updated: i64,
}

impl From<EntryRow> for Entry {
    fn from(row: EntryRow) -> Self {
        Entry {
            id: row.id,
            feed_uri: row.feed_uri,
            key: row.key,
            title: row.title,
            link: row.link,
            summary: row.summary,
            thumbnail: row.thumbnail,
            last_updated: row.last_updated,
        }
    }
}

const ENTRY_UPSERT: &str = r#"
    INSERT INTO entries (feed_uri, key, title, link, summary, thumbnail, last_updated)
    VALUES ($1, $2, $3, $4, $5, $6, $7)
    ON CONFLICT (feed_uri, key) DO UPDATE SET
        title = excluded.title,
        link = excluded.link,
        summary = excluded.summary,
        thumbnail = excluded.thumbnail,
        last_updated = excluded.last_updated
"#;

/// Repository for feeds and their entries.
pub struct FeedRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> FeedRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// List every known feed.
    pub async fn get_all_feeds(&self) -> Result<Vec<Feed>> {
        let rows = sqlx::query_as::<_, FeedRow>(
            "SELECT id, uri, title, last_refreshed FROM feeds ORDER BY id",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Feed::from).collect())
    }

    /// Get a feed by its numeric id.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Feed>> {
        let row = sqlx::query_as::<_, FeedRow>(
            "SELECT id, uri, title, last_refreshed FROM feeds WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Feed::from))
    }

    /// Get a feed by URI.
    pub async fn get_by_uri(&self, uri: &str) -> Result<Option<Feed>> {
        let row = sqlx::query_as::<_, FeedRow>(
            "SELECT id, uri, title, last_refreshed FROM feeds WHERE uri = $1",
        )
        .bind(uri)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Feed::from))
    }

    /// Insert a feed, or update its title and refresh time if it exists.
    ///
    /// Runs as a single statement, so concurrent callers on the same URI
    /// resolve to last-writer-wins.
    pub async fn upsert_feed(&self, uri: &str, title: &str, last_refreshed: i64) -> Result<Feed> {
        let row = sqlx::query_as::<_, FeedRow>(
            r#"
            INSERT INTO feeds (uri, title, last_refreshed)
            VALUES ($1, $2, $3)
            ON CONFLICT (uri) DO UPDATE SET
                title = excluded.title,
                last_refreshed = excluded.last_refreshed
            RETURNING id, uri, title, last_refreshed
            "#,
        )
        .bind(uri)
        .bind(title)
        .bind(last_refreshed)
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }

    /// Insert an entry, or update it in place if `(feed_uri, key)` exists.
    pub async fn upsert_entry(&self, entry: &NewEntry) -> Result<()> {
        sqlx::query(ENTRY_UPSERT)
            .bind(&entry.feed_uri)
            .bind(&entry.key)
            .bind(&entry.title)
            .bind(&entry.link)
            .bind(&entry.summary)
            .bind(&entry.thumbnail)
            .bind(entry.last_updated)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Upsert a batch of entries in one transaction.
    pub async fn upsert_entries(&self, entries: &[NewEntry]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        for entry in entries {
            sqlx::query(ENTRY_UPSERT)
                .bind(&entry.feed_uri)
                .bind(&entry.key)
                .bind(&entry.title)
                .bind(&entry.link)
                .bind(&entry.summary)
                .bind(&entry.thumbnail)
                .bind(entry.last_updated)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(entries.len())
    }

    /// Entries of a feed, optionally only those updated strictly after `since`.
    ///
    /// Ordered oldest first.
    pub async fn get_entries(&self, feed_uri: &str, since: Option<i64>) -> Result<Vec<Entry>> {
        let rows = sqlx::query_as::<_, EntryRow>(
            r#"
            SELECT id, feed_uri, key, title, link, summary, thumbnail, last_updated
            FROM entries
            WHERE feed_uri = $1 AND ($2 IS NULL OR last_updated > $2)
            ORDER BY last_updated ASC, id ASC
            "#,
        )
        .bind(feed_uri)
        .bind(since)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Entry::from).collect())
    }

    /// Count entries of a feed.
    pub async fn count_entries(&self, feed_uri: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entries WHERE feed_uri = $1")
            .bind(feed_uri)
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}
