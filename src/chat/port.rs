//! Outbound messaging port.

use async_trait::async_trait;

use super::types::OutboundMessage;
use crate::Result;

/// Posting side of the chat platform, as seen by the command handlers and
/// the refresh scheduler.
#[async_trait]
pub trait ChatPort: Send + Sync {
    /// Post `message` into `group_id`.
    async fn post_to_group(&self, group_id: &str, message: &OutboundMessage) -> Result<()>;

    /// Post a plain text reply.
    async fn reply(&self, group_id: &str, text: &str) -> Result<()> {
        self.post_to_group(group_id, &OutboundMessage::text(text))
            .await
    }
}
