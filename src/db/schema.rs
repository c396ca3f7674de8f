//! Database schema and migrations for feedbot.
//!
//! Timestamps are stored as integer seconds since the Unix epoch.

/// Database migrations.
///
/// Each migration is a SQL script executed in order.
/// The schema_version table tracks which migrations have been applied.
pub const MIGRATIONS: &[&str] = &[
    // v1: Feeds and their entries
    r#"
CREATE TABLE feeds (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    uri             TEXT NOT NULL UNIQUE,
    title           TEXT NOT NULL DEFAULT '',
    last_refreshed  INTEGER NOT NULL DEFAULT 0,
    created_at      INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
);

-- key is the feed-supplied stable identifier (the entry link by convention)
CREATE TABLE entries (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    feed_uri        TEXT NOT NULL REFERENCES feeds(uri) ON DELETE CASCADE,
    key             TEXT NOT NULL,
    title           TEXT NOT NULL DEFAULT '',
    link            TEXT NOT NULL DEFAULT '',
    summary         TEXT NOT NULL DEFAULT '',
    thumbnail       TEXT,
    last_updated    INTEGER NOT NULL DEFAULT 0,
    UNIQUE (feed_uri, key)
);

CREATE INDEX idx_entries_feed_updated ON entries(feed_uri, last_updated);
"#,
    // v2: Group subscriptions with delivery watermark
    r#"
CREATE TABLE subscriptions (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    group_id        TEXT NOT NULL,
    feed_uri        TEXT NOT NULL REFERENCES feeds(uri) ON DELETE CASCADE,
    watermark       INTEGER NOT NULL DEFAULT 0,
    created_at      INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
    UNIQUE (group_id, feed_uri)
);

CREATE INDEX idx_subscriptions_feed ON subscriptions(feed_uri);
"#,
];
