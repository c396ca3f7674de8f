//! Chat platform integration.
//!
//! [`ChatPort`] is the only piece the bot core depends on; [`ChatClient`]
//! implements it over the platform's REST API.

mod client;
mod port;
mod token_cache;
mod types;

pub use client::{ChatClient, DEFAULT_EVENT_FILTERS, DEFAULT_WEBHOOK_EXPIRES_IN};
pub use port::ChatPort;
pub use token_cache::{AuthToken, FileTokenCache, MemoryTokenCache, TokenCache, TokenResponse};
pub use types::{
    Card, Group, IncomingPost, OutboundMessage, Person, PostEvent, WebhookEvent,
    WebhookSubscription,
};
