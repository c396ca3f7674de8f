//! Configuration module for feedbot.

use serde::Deserialize;
use std::path::Path;

use crate::{BotError, Result};

/// Webhook server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "data/feedbot.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/feedbot.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Feed polling and fetching configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedsConfig {
    /// Period of the feed-refresh loop in seconds. Also the per-cycle deadline.
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
    /// Period of the subscription-push loop in seconds.
    #[serde(default = "default_push_interval")]
    pub push_interval_secs: u64,
    /// How far back a new subscription starts, in seconds.
    #[serde(default = "default_backlog_window")]
    pub backlog_window_secs: u64,
    /// Maximum number of feeds fetched (or subscriptions pushed) at once.
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,
    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Total request timeout in seconds.
    #[serde(default = "default_total_timeout")]
    pub total_timeout_secs: u64,
    /// Maximum number of redirects.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    /// Maximum feed size in bytes.
    #[serde(default = "default_max_feed_size")]
    pub max_feed_size_bytes: u64,
    /// User-Agent header sent with every fetch.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Allow feeds on loopback/private addresses.
    #[serde(default)]
    pub allow_private_hosts: bool,
    /// Maximum number of entries returned by a search.
    #[serde(default = "default_max_search_results")]
    pub max_search_results: usize,
}

fn default_refresh_interval() -> u64 {
    300
}

fn default_push_interval() -> u64 {
    60
}

fn default_backlog_window() -> u64 {
    24 * 60 * 60
}

fn default_max_concurrent_fetches() -> usize {
    8
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_total_timeout() -> u64 {
    30
}

fn default_max_redirects() -> usize {
    5
}

fn default_max_feed_size() -> u64 {
    crate::feed::MAX_FEED_SIZE
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (compatible; feedbot/0.1; +https://github.com/feedbot/feedbot)".to_string()
}

fn default_max_search_results() -> usize {
    10
}

impl Default for FeedsConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval(),
            push_interval_secs: default_push_interval(),
            backlog_window_secs: default_backlog_window(),
            max_concurrent_fetches: default_max_concurrent_fetches(),
            connect_timeout_secs: default_connect_timeout(),
            total_timeout_secs: default_total_timeout(),
            max_redirects: default_max_redirects(),
            max_feed_size_bytes: default_max_feed_size(),
            user_agent: default_user_agent(),
            allow_private_hosts: false,
            max_search_results: default_max_search_results(),
        }
    }
}

/// Command handling configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    /// Word every command starts with.
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
    /// The bot's own person id. Discovered from the chat API when empty.
    #[serde(default)]
    pub bot_id: String,
}

fn default_command_prefix() -> String {
    "rss".to_string()
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            command_prefix: default_command_prefix(),
            bot_id: String::new(),
        }
    }
}

/// Chat platform client configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    /// Base URL of the chat platform REST API.
    #[serde(default = "default_server_url")]
    pub server_url: String,
    /// OAuth client id.
    #[serde(default)]
    pub client_id: String,
    /// OAuth client secret.
    #[serde(default)]
    pub client_secret: String,
    /// OAuth redirect URI registered for the bot.
    #[serde(default)]
    pub redirect_uri: String,
    /// Public address of this bot's webhook endpoint.
    #[serde(default)]
    pub events_uri: String,
    /// Shared secret expected in the `Verification-Token` header.
    #[serde(default)]
    pub webhook_token: String,
    /// Path of the persisted OAuth token.
    #[serde(default = "default_token_cache_path")]
    pub token_cache_path: String,
    /// Request timeout in seconds.
    #[serde(default = "default_chat_timeout")]
    pub timeout_secs: u64,
}

fn default_server_url() -> String {
    "https://platform.devtest.ringcentral.com".to_string()
}

fn default_token_cache_path() -> String {
    "data/auth_token.json".to_string()
}

fn default_chat_timeout() -> u64 {
    15
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: String::new(),
            events_uri: String::new(),
            webhook_token: String::new(),
            token_cache_path: default_token_cache_path(),
            timeout_secs: default_chat_timeout(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Webhook server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Feed configuration.
    #[serde(default)]
    pub feeds: FeedsConfig,
    /// Command configuration.
    #[serde(default)]
    pub bot: BotConfig,
    /// Chat platform configuration.
    #[serde(default)]
    pub chat: ChatConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(BotError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| BotError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `FEEDBOT_CLIENT_ID`: OAuth client id
    /// - `FEEDBOT_CLIENT_SECRET`: OAuth client secret
    /// - `FEEDBOT_WEBHOOK_TOKEN`: webhook shared secret
    ///
    /// Empty values are ignored.
    pub fn apply_env_overrides(&mut self) {
        let overrides: [(&str, &mut String); 3] = [
            ("FEEDBOT_CLIENT_ID", &mut self.chat.client_id),
            ("FEEDBOT_CLIENT_SECRET", &mut self.chat.client_secret),
            ("FEEDBOT_WEBHOOK_TOKEN", &mut self.chat.webhook_token),
        ];
        for (var, target) in overrides {
            if let Ok(value) = std::env::var(var) {
                if !value.is_empty() {
                    *target = value;
                }
            }
        }
    }

    /// Validate the configuration.
    ///
    /// Returns an error if:
    /// - either loop period is zero
    /// - `max_concurrent_fetches` is zero
    /// - a client id is configured without a client secret
    pub fn validate(&self) -> Result<()> {
        if self.feeds.refresh_interval_secs == 0 || self.feeds.push_interval_secs == 0 {
            return Err(BotError::Config(
                "refresh_interval_secs and push_interval_secs must be greater than zero"
                    .to_string(),
            ));
        }
        if self.feeds.max_concurrent_fetches == 0 {
            return Err(BotError::Config(
                "max_concurrent_fetches must be greater than zero".to_string(),
            ));
        }
        if !self.chat.client_id.is_empty() && self.chat.client_secret.is_empty() {
            return Err(BotError::Config(
                "chat.client_id is set but client_secret is not. \
                 Set it in config.toml or via FEEDBOT_CLIENT_SECRET environment variable."
                    .to_string(),
            ));
        }
        Ok(())
    }
}
