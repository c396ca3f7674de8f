//! Inbound post dispatch.

use std::sync::RwLock;

use tracing::{debug, warn};

use super::command::{CommandKind, CommandSet};
use super::handler::CommandHandler;
use crate::chat::IncomingPost;
use crate::Result;

/// Routes inbound posts to the first matching command.
pub struct CommandRouter {
    commands: CommandSet,
    handler: CommandHandler,
    bot_id: RwLock<Option<String>>,
}

impl CommandRouter {
    pub fn new(commands: CommandSet, handler: CommandHandler) -> Self {
        Self {
            commands,
            handler,
            bot_id: RwLock::new(None),
        }
    }

    /// Set the bot's own person id. Posts from it are never dispatched.
    pub fn with_bot_id(self, bot_id: impl Into<String>) -> Self {
        self.set_bot_id(bot_id);
        self
    }

    /// Set the bot's own id after construction (e.g. after OAuth login).
    pub fn set_bot_id(&self, bot_id: impl Into<String>) {
        let bot_id = bot_id.into();
        if bot_id.is_empty() {
            return;
        }
        if let Ok(mut guard) = self.bot_id.write() {
            *guard = Some(bot_id);
        }
    }

    /// The bot's own id, if known.
    pub fn bot_id(&self) -> Option<String> {
        self.bot_id.read().ok().and_then(|guard| guard.clone())
    }

    fn is_own_post(&self, post: &IncomingPost) -> bool {
        match self.bot_id.read() {
            Ok(guard) => guard.as_deref() == Some(post.creator_id.as_str()),
            Err(_) => false,
        }
    }

    /// Dispatch `post`. Returns the kind of command executed, or `None` when
    /// the post was the bot's own or matched no command.
    pub async fn dispatch(&self, post: &IncomingPost) -> Result<Option<CommandKind>> {
        if self.is_own_post(post) {
            debug!(group_id = %post.group_id, "Ignoring own post");
            return Ok(None);
        }

        let Some(command) = self.commands.parse(&post.text) else {
            return Ok(None);
        };
        let kind = command.kind();
        debug!(
            group_id = %post.group_id,
            creator_id = %post.creator_id,
            command = kind.name(),
            "Dispatching command"
        );

        self.handler.execute(post, command).await?;
        Ok(Some(kind))
    }

    /// Dispatch and log any failure. Used by the webhook boundary, where
    /// there is no caller to return an error to.
    pub async fn handle(&self, post: IncomingPost) {
        if let Err(e) = self.dispatch(&post).await {
            warn!(group_id = %post.group_id, text = %post.text, "Command failed: {}", e);
        }
    }
}
