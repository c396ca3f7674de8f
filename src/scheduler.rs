//! Background refresh and push loops.
//!
//! Two independent periodic tasks:
//!
//! - the feed-refresh loop re-fetches every known feed and stores its title
//!   and entries;
//! - the subscription-push loop posts entries newer than each subscription's
//!   watermark and then advances the watermark.
//!
//! Each cycle runs its items concurrently under a deadline equal to the loop
//! period. Items still running at the deadline are dropped.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout_at, Duration, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::bot::render;
use crate::chat::ChatPort;
use crate::config::FeedsConfig;
use crate::db::Database;
use crate::feed::{Feed, FeedRepository, FeedSource};
use crate::subscription::{Subscription, SubscriptionFilter, SubscriptionRepository};
use crate::Result;

/// Loop periods and concurrency of a [`RefreshScheduler`].
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    /// Period (and per-cycle deadline) of the feed-refresh loop.
    pub refresh_period: Duration,
    /// Period (and per-cycle deadline) of the subscription-push loop.
    pub push_period: Duration,
    /// Items processed at once within a cycle.
    pub max_concurrency: usize,
}

impl From<&FeedsConfig> for SchedulerSettings {
    fn from(config: &FeedsConfig) -> Self {
        Self {
            refresh_period: Duration::from_secs(config.refresh_interval_secs),
            push_period: Duration::from_secs(config.push_interval_secs),
            max_concurrency: config.max_concurrent_fetches,
        }
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self::from(&FeedsConfig::default())
    }
}

/// Outcome of one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Items that completed without error.
    pub succeeded: usize,
    /// Items that completed with an error.
    pub failed: usize,
    /// Items not finished before the deadline.
    pub cancelled: usize,
}

impl CycleReport {
    /// Number of items the cycle started with.
    pub fn total(&self) -> usize {
        self.succeeded + self.failed + self.cancelled
    }
}

/// Keeps feeds fresh and delivers new entries to subscribed groups.
pub struct RefreshScheduler {
    db: Database,
    source: Arc<dyn FeedSource>,
    chat: Arc<dyn ChatPort>,
    settings: SchedulerSettings,
}

impl RefreshScheduler {
    pub fn new(
        db: Database,
        source: Arc<dyn FeedSource>,
        chat: Arc<dyn ChatPort>,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            db,
            source,
            chat,
            settings,
        }
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    /// Spawn both loops. They run until the runtime shuts down or the
    /// handles are aborted.
    pub fn start(self: Arc<Self>) -> (JoinHandle<()>, JoinHandle<()>) {
        let refresher = Arc::clone(&self);
        let refresh = tokio::spawn(async move { refresher.run_feed_refresh().await });
        let push = tokio::spawn(async move { self.run_push().await });
        (refresh, push)
    }

    /// Run the feed-refresh loop forever.
    pub async fn run_feed_refresh(&self) {
        info!(
            "Feed refresh loop started (period: {} seconds)",
            self.settings.refresh_period.as_secs()
        );
        let mut timer = interval(self.settings.refresh_period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            timer.tick().await;
            match self.refresh_feeds_once().await {
                Ok(report) => log_report("Feed refresh", &report),
                Err(e) => error!("Failed to list feeds for refresh: {}", e),
            }
        }
    }

    /// Run the subscription-push loop forever.
    pub async fn run_push(&self) {
        info!(
            "Push loop started (period: {} seconds)",
            self.settings.push_period.as_secs()
        );
        let mut timer = interval(self.settings.push_period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            timer.tick().await;
            match self.push_subscriptions_once().await {
                Ok(report) => log_report("Push", &report),
                Err(e) => error!("Failed to list subscriptions for push: {}", e),
            }
        }
    }

    /// One feed-refresh cycle over every known feed.
    ///
    /// Only listing the feeds can fail; per-feed failures are counted in the
    /// report.
    pub async fn refresh_feeds_once(&self) -> Result<CycleReport> {
        let feeds = FeedRepository::new(self.db.pool()).get_all_feeds().await?;
        if feeds.is_empty() {
            return Ok(CycleReport::default());
        }
        debug!("Refreshing {} feed(s)", feeds.len());

        let deadline = Instant::now() + self.settings.refresh_period;
        Ok(self
            .run_cycle(feeds, deadline, |feed| self.refresh_feed(feed))
            .await)
    }

    /// One push cycle over every subscription.
    pub async fn push_subscriptions_once(&self) -> Result<CycleReport> {
        let subscriptions = SubscriptionRepository::new(self.db.pool())
            .list(&SubscriptionFilter::new().eager())
            .await?;
        if subscriptions.is_empty() {
            return Ok(CycleReport::default());
        }

        let deadline = Instant::now() + self.settings.push_period;
        Ok(self
            .run_cycle(subscriptions, deadline, |sub| self.push_subscription(sub))
            .await)
    }

    async fn refresh_feed(&self, feed: Feed) -> Result<()> {
        let parsed = self.source.fetch_feed(&feed.uri).await.map_err(|e| {
            warn!(feed_uri = %feed.uri, "Failed to fetch feed: {}", e);
            e
        })?;

        let repo = FeedRepository::new(self.db.pool());
        let stored = async {
            repo.upsert_feed(&feed.uri, &parsed.title, Utc::now().timestamp())
                .await?;
            repo.upsert_entries(&parsed.new_entries(&feed.uri)).await
        }
        .await;

        match stored {
            Ok(count) => {
                debug!(feed_uri = %feed.uri, entries = count, "Feed refreshed");
                Ok(())
            }
            Err(e) => {
                warn!(feed_uri = %feed.uri, "Failed to store feed: {}", e);
                Err(e)
            }
        }
    }

    async fn push_subscription(&self, sub: Subscription) -> Result<()> {
        let result = self.deliver(&sub).await;
        if let Err(ref e) = result {
            warn!(
                group_id = %sub.group_id,
                feed_uri = %sub.feed_uri,
                "Failed to push entries: {}", e
            );
        }
        result
    }

    async fn deliver(&self, sub: &Subscription) -> Result<()> {
        let entries = FeedRepository::new(self.db.pool())
            .get_entries(&sub.feed_uri, Some(sub.watermark))
            .await?;
        let Some(newest) = entries.iter().map(|e| e.last_updated).max() else {
            return Ok(());
        };

        let title = sub
            .feed
            .as_ref()
            .map(|feed| feed.title.as_str())
            .unwrap_or(sub.feed_uri.as_str());
        self.chat
            .post_to_group(&sub.group_id, &render(title, &entries))
            .await?;

        SubscriptionRepository::new(self.db.pool())
            .advance_watermark(&sub.group_id, &sub.feed_uri, newest)
            .await?;
        info!(
            group_id = %sub.group_id,
            feed_uri = %sub.feed_uri,
            "Delivered {} new entries",
            entries.len()
        );
        Ok(())
    }

    /// Run `work` over `items` with bounded concurrency until all finish or
    /// `deadline` passes. Unfinished items are dropped.
    async fn run_cycle<T, F, Fut>(&self, items: Vec<T>, deadline: Instant, work: F) -> CycleReport
    where
        F: Fn(T) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let total = items.len();
        let mut report = CycleReport::default();
        let mut results = stream::iter(items)
            .map(work)
            .buffer_unordered(self.settings.max_concurrency.max(1));

        loop {
            match timeout_at(deadline, results.next()).await {
                Ok(Some(Ok(()))) => report.succeeded += 1,
                Ok(Some(Err(_))) => report.failed += 1,
                Ok(None) => break,
                Err(_) => {
                    warn!("Cycle deadline reached, cancelling outstanding items");
                    break;
                }
            }
        }

        report.cancelled = total - report.succeeded - report.failed;
        report
    }
}

fn log_report(cycle: &str, report: &CycleReport) {
    if report.total() == 0 {
        debug!("{} cycle: nothing to do", cycle);
    } else {
        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            cancelled = report.cancelled,
            "{} cycle finished",
            cycle
        );
    }
}
