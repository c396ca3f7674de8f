//! Chat command matching.
//!
//! A [`CommandSet`] is an explicitly ordered list of [`CommandMatcher`]s.
//! Parsing tries them in order and the first match wins.

use regex::{Captures, Regex};

use crate::{BotError, Result};

/// Kind of a recognized command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Help,
    List,
    Subscribe,
    Unsubscribe,
    Search,
}

impl CommandKind {
    /// Dispatch order of the standard command set.
    pub const ORDER: [CommandKind; 5] = [
        CommandKind::Help,
        CommandKind::List,
        CommandKind::Subscribe,
        CommandKind::Unsubscribe,
        CommandKind::Search,
    ];

    /// Command name.
    pub fn name(self) -> &'static str {
        match self {
            CommandKind::Help => "help",
            CommandKind::List => "list",
            CommandKind::Subscribe => "subscribe",
            CommandKind::Unsubscribe => "unsubscribe",
            CommandKind::Search => "search",
        }
    }

    /// Pattern for this command after `prefix` (already escaped).
    ///
    /// Arguments are captured by name: `uri`, `feed_id` and `pattern`.
    fn pattern(self, prefix: &str) -> String {
        let body = match self {
            CommandKind::Help => r"(?:\s+help)?",
            CommandKind::List => r"\s+list",
            CommandKind::Subscribe => r"\s+(?:subscribe|sub)\s+(?P<uri>\S+)",
            CommandKind::Unsubscribe => r"\s+(?:unsubscribe|unsub)\s+(?P<feed_id>\d+)",
            CommandKind::Search => r"\s+search\s+(?:(?P<feed_id>\d+)\s+)?(?P<pattern>.+?)",
        };
        format!(r"(?i)^\s*{prefix}{body}\s*$")
    }
}

/// A parsed command with its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    List,
    Subscribe { uri: String },
    Unsubscribe { feed_id: i64 },
    Search { feed_id: Option<i64>, pattern: String },
}

impl Command {
    /// Kind of this command.
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Help => CommandKind::Help,
            Command::List => CommandKind::List,
            Command::Subscribe { .. } => CommandKind::Subscribe,
            Command::Unsubscribe { .. } => CommandKind::Unsubscribe,
            Command::Search { .. } => CommandKind::Search,
        }
    }
}

/// One entry of a command set: a kind and the regex that recognizes it.
#[derive(Debug, Clone)]
pub struct CommandMatcher {
    kind: CommandKind,
    regex: Regex,
}

impl CommandMatcher {
    /// Create a matcher from a raw pattern.
    pub fn new(kind: CommandKind, pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern)
            .map_err(|e| BotError::Config(format!("invalid {} pattern: {e}", kind.name())))?;
        Ok(Self { kind, regex })
    }

    /// The standard matcher for `kind` under `prefix`.
    pub fn standard(kind: CommandKind, prefix: &str) -> Result<Self> {
        Self::new(kind, &kind.pattern(&regex::escape(prefix)))
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    /// Match `text`, returning the command with its arguments.
    pub fn matches(&self, text: &str) -> Option<Command> {
        let caps = self.regex.captures(text)?;
        match self.kind {
            CommandKind::Help => Some(Command::Help),
            CommandKind::List => Some(Command::List),
            CommandKind::Subscribe => Some(Command::Subscribe {
                uri: named(&caps, "uri")?.to_string(),
            }),
            CommandKind::Unsubscribe => Some(Command::Unsubscribe {
                feed_id: named(&caps, "feed_id")?.parse().ok()?,
            }),
            CommandKind::Search => {
                let feed_id = match named(&caps, "feed_id") {
                    Some(id) => Some(id.parse().ok()?),
                    None => None,
                };
                Some(Command::Search {
                    feed_id,
                    pattern: named(&caps, "pattern")?.to_string(),
                })
            }
        }
    }
}

fn named<'t>(caps: &Captures<'t>, name: &str) -> Option<&'t str> {
    caps.name(name).map(|m| m.as_str())
}

/// Ordered set of command matchers.
#[derive(Debug, Clone)]
pub struct CommandSet {
    matchers: Vec<CommandMatcher>,
}

impl CommandSet {
    /// The standard commands under `prefix`, in [`CommandKind::ORDER`].
    pub fn standard(prefix: &str) -> Result<Self> {
        let matchers = CommandKind::ORDER
            .iter()
            .map(|kind| CommandMatcher::standard(*kind, prefix))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { matchers })
    }

    /// A set evaluated in exactly the given order.
    pub fn from_matchers(matchers: Vec<CommandMatcher>) -> Self {
        Self { matchers }
    }

    /// Kinds in evaluation order.
    pub fn order(&self) -> Vec<CommandKind> {
        self.matchers.iter().map(|m| m.kind).collect()
    }

    /// Parse `text` with the first matching matcher.
    pub fn parse(&self, text: &str) -> Option<Command> {
        self.matchers.iter().find_map(|m| m.matches(text))
    }
}

/// Help entry for one command.
#[derive(Debug, Clone)]
pub struct CommandInfo {
    /// Command name.
    pub name: &'static str,
    /// Command aliases.
    pub aliases: &'static [&'static str],
    /// Arguments after the command name.
    pub args: &'static str,
    /// Command description.
    pub description: &'static str,
}

/// Get all available command information.
pub fn get_command_help() -> Vec<CommandInfo> {
    vec![
        CommandInfo {
            name: "help",
            aliases: &[],
            args: "",
            description: "Show this help",
        },
        CommandInfo {
            name: "list",
            aliases: &[],
            args: "",
            description: "List the feeds this chat is subscribed to",
        },
        CommandInfo {
            name: "subscribe",
            aliases: &["sub"],
            args: "<feed url>",
            description: "Subscribe this chat to an RSS/Atom feed",
        },
        CommandInfo {
            name: "unsubscribe",
            aliases: &["unsub"],
            args: "<feed id>",
            description: "Unsubscribe from a feed (ids are shown by list)",
        },
        CommandInfo {
            name: "search",
            aliases: &[],
            args: "[feed id] <regex>",
            description: "Search entry titles and summaries, case-insensitive",
        },
    ]
}

/// Format the help message for display.
pub fn format_help(prefix: &str) -> String {
    let mut lines = vec!["**Feed bot commands**".to_string()];
    for info in get_command_help() {
        let mut line = format!("* `{prefix} {}", info.name);
        if !info.args.is_empty() {
            line.push(' ');
            line.push_str(info.args);
        }
        line.push('`');
        line.push_str(&format!(": {}", info.description));
        if !info.aliases.is_empty() {
            line.push_str(&format!(" (alias: {})", info.aliases.join(", ")));
        }
        lines.push(line);
    }
    lines.join("\n")
}
