//! Chat command handling for feedbot.
//!
//! - Command matching ([`CommandSet`])
//! - Command execution ([`CommandHandler`])
//! - Post dispatch ([`CommandRouter`])
//! - Message rendering ([`format`])

mod command;
pub mod format;
mod handler;
mod router;

pub use command::{
    format_help, get_command_help, Command, CommandInfo, CommandKind, CommandMatcher, CommandSet,
};
pub use format::render;
pub use handler::{CommandHandler, HandlerSettings, GENERIC_FAILURE_REPLY};
pub use router::CommandRouter;
