//! Rendering of entries and subscriptions into chat messages.
//!
//! Everything here is a pure function of its inputs.

use html2text::from_read_with_decorator;
use html2text::render::text_renderer::TrivialDecorator;

use crate::chat::{Card, OutboundMessage};
use crate::feed::{truncate_chars, Entry};
use crate::subscription::Subscription;

/// Maximum card body length in characters.
pub const MAX_CARD_TEXT_LENGTH: usize = 500;

/// Render new entries of one feed as a notification.
///
/// Produces a summary line and one card per entry, in the given order.
pub fn render(feed_title: &str, entries: &[Entry]) -> OutboundMessage {
    let mut message = OutboundMessage::text(format!(
        "{} new entries from {}!",
        entries.len(),
        feed_title
    ));
    for entry in entries {
        message = message.with_card(entry_card(entry));
    }
    message
}

/// Render search hits.
pub fn render_search_results(pattern: &str, entries: &[Entry]) -> OutboundMessage {
    if entries.is_empty() {
        return OutboundMessage::text(format!("No entries match `{pattern}`."));
    }
    let mut message = OutboundMessage::text(format!(
        "{} entries match `{}`:",
        entries.len(),
        pattern
    ));
    for entry in entries {
        message = message.with_card(entry_card(entry));
    }
    message
}

/// Render a group's subscriptions as one text message.
///
/// Subscriptions must be loaded with their feed; ones without it are listed
/// by URI only.
pub fn render_subscription_list(subscriptions: &[Subscription]) -> OutboundMessage {
    if subscriptions.is_empty() {
        return OutboundMessage::text("This chat has no subscriptions yet.");
    }
    let mut lines = vec![format!("Subscribed feeds ({}):", subscriptions.len())];
    for sub in subscriptions {
        match &sub.feed {
            Some(feed) => lines.push(format!("[{}] {} - {}", feed.id, feed.title, feed.uri)),
            None => lines.push(format!("[?] {}", sub.feed_uri)),
        }
    }
    OutboundMessage::text(lines.join("\n"))
}

/// Card for one entry: linked title, plain-text summary, thumbnail.
pub fn entry_card(entry: &Entry) -> Card {
    let title = if entry.title.trim().is_empty() {
        entry.link.as_str()
    } else {
        entry.title.trim()
    };
    let mut text = strip_html(&entry.summary);
    if text.chars().count() > MAX_CARD_TEXT_LENGTH {
        text = format!("{}...", truncate_chars(&text, MAX_CARD_TEXT_LENGTH));
    }

    Card::new(format!("[{}]({})", title, entry.link))
        .with_text(text)
        .with_thumbnail(entry.thumbnail.clone())
}

/// Convert an HTML fragment to plain text, collapsing whitespace.
pub fn strip_html(html: &str) -> String {
    if html.trim().is_empty() {
        return String::new();
    }
    let text = from_read_with_decorator(html.as_bytes(), usize::MAX, TrivialDecorator::new());
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
