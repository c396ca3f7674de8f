//! Subscription types.

use crate::feed::Feed;

/// A chat group's subscription to a feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    /// Row id.
    pub id: i64,
    /// Chat group id.
    pub group_id: String,
    /// Subscribed feed URI.
    pub feed_uri: String,
    /// `last_updated` of the newest entry already delivered.
    pub watermark: i64,
    /// Unix time the subscription was created.
    pub created_at: i64,
    /// The feed, when loaded with [`SubscriptionFilter::eager`].
    pub feed: Option<Feed>,
}

/// Filter for listing subscriptions.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionFilter {
    pub group_id: Option<String>,
    pub feed_id: Option<i64>,
    pub feed_uri: Option<String>,
    /// Load the feed in the same query.
    pub eager_load_feed: bool,
}

impl SubscriptionFilter {
    /// Match every subscription.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to one chat group.
    pub fn group(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }

    /// Restrict to one feed by numeric id.
    pub fn feed_id(mut self, feed_id: i64) -> Self {
        self.feed_id = Some(feed_id);
        self
    }

    /// Restrict to one feed by URI.
    pub fn feed_uri(mut self, feed_uri: impl Into<String>) -> Self {
        self.feed_uri = Some(feed_uri.into());
        self
    }

    /// Load the associated feed.
    pub fn eager(mut self) -> Self {
        self.eager_load_feed = true;
        self
    }
}
