//! Group subscriptions to feeds.

mod repository;
mod types;

pub use repository::SubscriptionRepository;
pub use types::{Subscription, SubscriptionFilter};
