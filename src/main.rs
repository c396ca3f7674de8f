use std::sync::Arc;

use tracing::{error, info, warn};

use feedbot::bot::{CommandHandler, CommandRouter, CommandSet, HandlerSettings};
use feedbot::chat::{ChatClient, ChatPort, FileTokenCache};
use feedbot::web::{AppState, WebServer};
use feedbot::{Config, Database, FeedFetcher, RefreshScheduler, SchedulerSettings};

#[tokio::main]
async fn main() {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    // Load configuration
    let config = match Config::load_with_env(&path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {path}: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    // Initialize logging
    if let Err(e) = feedbot::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        feedbot::logging::init_console_only(&config.logging.level);
    }

    if let Err(e) = run(config).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> feedbot::Result<()> {
    config.validate()?;
    info!("feedbot starting");

    let db = Database::open(&config.database.path).await?;
    info!("Database opened at {}", config.database.path);

    let fetcher = Arc::new(FeedFetcher::new(&config.feeds)?);
    let cache = Arc::new(FileTokenCache::new(&config.chat.token_cache_path));
    let chat = Arc::new(ChatClient::new(&config.chat, cache)?);
    let chat_port: Arc<dyn ChatPort> = chat.clone();

    let settings = HandlerSettings {
        prefix: config.bot.command_prefix.clone(),
        backlog_window_secs: i64::try_from(config.feeds.backlog_window_secs).unwrap_or(i64::MAX),
        max_search_results: config.feeds.max_search_results,
    };
    let handler = CommandHandler::new(db.clone(), fetcher.clone(), chat_port.clone(), settings);
    let router = Arc::new(CommandRouter::new(
        CommandSet::standard(&config.bot.command_prefix)?,
        handler,
    ));

    if !config.bot.bot_id.is_empty() {
        router.set_bot_id(config.bot.bot_id.clone());
    } else if chat.is_authorized().await {
        match chat.me().await {
            Ok(me) => {
                info!(bot_id = %me.id, "Discovered own identity");
                router.set_bot_id(me.id.clone());
            }
            Err(e) => warn!("Could not look up own identity: {}", e),
        }
    } else {
        warn!("Chat client is not authorized yet; visit the OAuth redirect to log in");
    }

    if config.chat.webhook_token.is_empty() {
        warn!("chat.webhook_token is empty, webhook calls are not verified");
    }

    let scheduler = Arc::new(RefreshScheduler::new(
        db,
        fetcher,
        chat_port,
        SchedulerSettings::from(&config.feeds),
    ));
    let (_refresh, _push) = scheduler.start();

    let state = AppState::new(router, config.chat.webhook_token.clone())
        .with_chat(chat, config.chat.events_uri.clone());
    WebServer::new(&config.server, Arc::new(state))?.run().await
}
