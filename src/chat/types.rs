//! Chat platform message types.

use serde::{Deserialize, Serialize};

/// An outbound post: plain text, optionally with cards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundMessage {
    pub text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Card>,
}

impl OutboundMessage {
    /// A text-only message.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attachments: Vec::new(),
        }
    }

    /// Append a card.
    pub fn with_card(mut self, card: Card) -> Self {
        self.attachments.push(card);
        self
    }

    /// Whether this message carries no cards.
    pub fn is_plain(&self) -> bool {
        self.attachments.is_empty()
    }
}

/// A card attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    #[serde(rename = "type")]
    pub kind: String,
    /// Markdown title, usually `[title](link)`.
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_uri: Option<String>,
}

impl Card {
    /// Create a card with a title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            kind: "Card".to_string(),
            title: title.into(),
            text: None,
            thumbnail_uri: None,
        }
    }

    /// Set the body text. Empty text leaves it unset.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.text = if text.is_empty() { None } else { Some(text) };
        self
    }

    /// Set the thumbnail URI.
    pub fn with_thumbnail(mut self, uri: Option<String>) -> Self {
        self.thumbnail_uri = uri;
        self
    }
}

/// Webhook notification envelope.
///
/// Only the fields the bot uses are declared; everything else is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookEvent {
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub body: Option<PostEvent>,
}

/// Body of a post event.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostEvent {
    #[serde(default)]
    pub creator_id: Option<String>,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

/// A post the command router can act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingPost {
    pub creator_id: String,
    pub group_id: String,
    pub text: String,
}

impl IncomingPost {
    /// Create a post.
    pub fn new(
        creator_id: impl Into<String>,
        group_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            creator_id: creator_id.into(),
            group_id: group_id.into(),
            text: text.into(),
        }
    }
}

impl WebhookEvent {
    /// The post carried by this event, if it has a group and text.
    pub fn into_post(self) -> Option<IncomingPost> {
        let body = self.body?;
        Some(IncomingPost {
            creator_id: body.creator_id.unwrap_or_default(),
            group_id: body.group_id?,
            text: body.text?,
        })
    }
}

/// A person record from the chat platform.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub id: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

/// A chat group record.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Group {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

/// A registered webhook subscription.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookSubscription {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub expiration_time: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_message_serializes_without_attachments() {
        let value = serde_json::to_value(OutboundMessage::text("hello")).unwrap();
        assert_eq!(value, json!({"text": "hello"}));
    }

    #[test]
    fn test_card_serialization() {
        let message = OutboundMessage::text("1 new entries from Example!").with_card(
            Card::new("[One](https://example.com/1)")
                .with_text("summary")
                .with_thumbnail(Some("https://example.com/1.png".to_string())),
        );

        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(
            value,
            json!({
                "text": "1 new entries from Example!",
                "attachments": [{
                    "type": "Card",
                    "title": "[One](https://example.com/1)",
                    "text": "summary",
                    "thumbnailUri": "https://example.com/1.png"
                }]
            })
        );
    }

    #[test]
    fn test_card_empty_text_is_omitted() {
        let card = Card::new("t").with_text("");
        assert!(card.text.is_none());
        let value = serde_json::to_value(&card).unwrap();
        assert!(value.get("text").is_none());
        assert!(value.get("thumbnailUri").is_none());
    }

    #[test]
    fn test_webhook_event_into_post() {
        let event: WebhookEvent = serde_json::from_value(json!({
            "uuid": "1",
            "event": "/restapi/v1.0/glip/posts",
            "ownerId": "999",
            "body": {
                "id": "p1",
                "creatorId": "u1",
                "groupId": "g1",
                "text": "rss list",
                "eventType": "PostAdded"
            }
        }))
        .unwrap();

        assert_eq!(
            event.into_post(),
            Some(IncomingPost::new("u1", "g1", "rss list"))
        );
    }

    #[test]
    fn test_webhook_event_without_text() {
        let event: WebhookEvent = serde_json::from_value(json!({
            "body": {"id": "g1", "groupId": "g1", "eventType": "GroupJoined"}
        }))
        .unwrap();
        assert!(event.into_post().is_none());

        let empty: WebhookEvent = serde_json::from_value(json!({})).unwrap();
        assert!(empty.into_post().is_none());
    }
}
