//! Subscription storage.

use sqlx::QueryBuilder;

use super::types::{Subscription, SubscriptionFilter};
use crate::db::DbPool;
use crate::feed::Feed;
use crate::{BotError, Result};

/// Row type for a subscription, with optional joined feed columns.
#[derive(Debug, Clone, sqlx::FromRow)]
struct SubscriptionRow {
    id: i64,
    group_id: String,
    feed_uri: String,
    watermark: i64,
    created_at: i64,
    feed_id: Option<i64>,
    feed_title: Option<String>,
    feed_last_refreshed: Option<i64>,
}

impl From<SubscriptionRow> for Subscription {
    fn from(row: SubscriptionRow) -> Self {
        let feed = match (row.feed_id, row.feed_title, row.feed_last_refreshed) {
            (Some(id), Some(title), Some(last_refreshed)) => Some(Feed {
                id,
                uri: row.feed_uri.clone(),
                title,
                last_refreshed,
            }),
            _ => None,
        };
        Subscription {
            id: row.id,
            group_id: row.group_id,
            feed_uri: row.feed_uri,
            watermark: row.watermark,
            created_at: row.created_at,
            feed,
        }
    }
}

/// Repository for subscription operations.
pub struct SubscriptionRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> SubscriptionRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Get the subscription of `group_id` to `feed_uri`.
    pub async fn get(&self, group_id: &str, feed_uri: &str) -> Result<Option<Subscription>> {
        let row = sqlx::query_as::<_, SubscriptionRow>(
            r#"
            SELECT id, group_id, feed_uri, watermark, created_at,
                   NULL AS feed_id, NULL AS feed_title, NULL AS feed_last_refreshed
            FROM subscriptions
            WHERE group_id = $1 AND feed_uri = $2
            "#,
        )
        .bind(group_id)
        .bind(feed_uri)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Subscription::from))
    }

    /// Return the existing subscription, or create one with `initial_watermark`.
    ///
    /// The flag is `true` only when this call created the row. An existing
    /// row is returned unchanged.
    pub async fn get_or_create(
        &self,
        group_id: &str,
        feed_uri: &str,
        initial_watermark: i64,
    ) -> Result<(Subscription, bool)> {
        let result = sqlx::query(
            r#"
            INSERT INTO subscriptions (group_id, feed_uri, watermark)
            VALUES ($1, $2, $3)
            ON CONFLICT (group_id, feed_uri) DO NOTHING
            "#,
        )
        .bind(group_id)
        .bind(feed_uri)
        .bind(initial_watermark)
        .execute(self.pool)
        .await?;
        let created = result.rows_affected() > 0;

        let subscription = self
            .get(group_id, feed_uri)
            .await?
            .ok_or_else(|| BotError::NotFound(format!("subscription {group_id}/{feed_uri}")))?;

        Ok((subscription, created))
    }

    /// Move the watermark forward to `new_watermark`.
    ///
    /// Values not greater than the stored watermark are ignored. Returns
    /// whether the watermark changed.
    pub async fn advance_watermark(
        &self,
        group_id: &str,
        feed_uri: &str,
        new_watermark: i64,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE subscriptions SET watermark = $1
            WHERE group_id = $2 AND feed_uri = $3 AND watermark < $1
            "#,
        )
        .bind(new_watermark)
        .bind(group_id)
        .bind(feed_uri)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// List subscriptions matching `filter`, ordered by creation.
    pub async fn list(&self, filter: &SubscriptionFilter) -> Result<Vec<Subscription>> {
        let mut query: QueryBuilder<sqlx::Sqlite> =
            QueryBuilder::new("SELECT s.id, s.group_id, s.feed_uri, s.watermark, s.created_at, ");

        if filter.eager_load_feed {
            query.push(
                "f.id AS feed_id, f.title AS feed_title, f.last_refreshed AS feed_last_refreshed \
                 FROM subscriptions s JOIN feeds f ON f.uri = s.feed_uri",
            );
        } else {
            query.push(
                "NULL AS feed_id, NULL AS feed_title, NULL AS feed_last_refreshed \
                 FROM subscriptions s",
            );
            if filter.feed_id.is_some() {
                query.push(" JOIN feeds f ON f.uri = s.feed_uri");
            }
        }

        query.push(" WHERE 1 = 1");
        if let Some(ref group_id) = filter.group_id {
            query.push(" AND s.group_id = ");
            query.push_bind(group_id);
        }
        if let Some(ref feed_uri) = filter.feed_uri {
            query.push(" AND s.feed_uri = ");
            query.push_bind(feed_uri);
        }
        if let Some(feed_id) = filter.feed_id {
            query.push(" AND f.id = ");
            query.push_bind(feed_id);
        }
        query.push(" ORDER BY s.id ASC");

        let rows = query
            .build_query_as::<SubscriptionRow>()
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(Subscription::from).collect())
    }

    /// Delete the subscription. Returns whether a row existed.
    pub async fn delete(&self, group_id: &str, feed_uri: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM subscriptions WHERE group_id = $1 AND feed_uri = $2")
            .bind(group_id)
            .bind(feed_uri)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
