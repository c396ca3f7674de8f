//! feedbot - RSS/Atom subscriptions for group chats
//!
//! Chat groups subscribe to feeds with text commands; background loops keep
//! the feeds fresh and post new entries back into the subscribed groups.

pub mod bot;
pub mod chat;
pub mod config;
pub mod db;
pub mod error;
pub mod feed;
pub mod logging;
pub mod scheduler;
pub mod subscription;
pub mod web;

#[cfg(test)]
mod testing;

pub use bot::{Command, CommandHandler, CommandKind, CommandRouter, CommandSet, HandlerSettings};
pub use chat::{ChatClient, ChatPort, IncomingPost, OutboundMessage};
pub use config::Config;
pub use db::Database;
pub use error::{BotError, Result};
pub use feed::{Entry, Feed, FeedFetcher, FeedRepository, FeedSource, ParsedEntry, ParsedFeed};
pub use scheduler::{CycleReport, RefreshScheduler, SchedulerSettings};
pub use subscription::{Subscription, SubscriptionFilter, SubscriptionRepository};
