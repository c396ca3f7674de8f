//! Request handlers for the webhook boundary.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::bot::CommandRouter;
use crate::chat::{ChatClient, WebhookEvent, DEFAULT_EVENT_FILTERS, DEFAULT_WEBHOOK_EXPIRES_IN};

use super::error::ApiError;

/// Header the chat platform sends when registering a webhook.
pub const VALIDATION_TOKEN_HEADER: &str = "validation-token";

/// Header carrying the shared webhook secret on every notification.
pub const VERIFICATION_TOKEN_HEADER: &str = "verification-token";

/// Shared application state.
pub struct AppState {
    /// Command router that receives inbound posts.
    pub router: Arc<CommandRouter>,
    /// Chat client used by the OAuth callback. `None` when no credentials
    /// are configured.
    pub chat: Option<Arc<ChatClient>>,
    /// Expected `Verification-Token`. Empty disables the check.
    pub webhook_token: String,
    /// Address registered as the webhook after OAuth login.
    pub events_uri: String,
}

impl AppState {
    pub fn new(router: Arc<CommandRouter>, webhook_token: impl Into<String>) -> Self {
        Self {
            router,
            chat: None,
            webhook_token: webhook_token.into(),
            events_uri: String::new(),
        }
    }

    /// Enable the OAuth callback.
    pub fn with_chat(mut self, chat: Arc<ChatClient>, events_uri: impl Into<String>) -> Self {
        self.chat = Some(chat);
        self.events_uri = events_uri.into();
        self
    }

    fn verify(&self, headers: &HeaderMap) -> Result<(), ApiError> {
        if self.webhook_token.is_empty() {
            return Ok(());
        }
        let provided = headers
            .get(VERIFICATION_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if provided != self.webhook_token {
            return Err(ApiError::unauthorized("invalid verification token"));
        }
        Ok(())
    }
}

/// GET /health
pub async fn health_check() -> &'static str {
    "OK"
}

/// POST /webhook - Receive chat platform notifications.
///
/// Registration handshakes are answered by echoing `Validation-Token`.
/// Post events are dispatched on a separate task so the platform gets its
/// acknowledgement immediately.
pub async fn webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    if let Some(token) = headers.get(VALIDATION_TOKEN_HEADER) {
        debug!("Answering webhook validation request");
        let mut response = StatusCode::OK.into_response();
        response
            .headers_mut()
            .insert(VALIDATION_TOKEN_HEADER, token.clone());
        return Ok(response);
    }

    state.verify(&headers).map_err(|e| {
        warn!("Rejected webhook call with bad verification token");
        e
    })?;

    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| ApiError::bad_request(format!("invalid event payload: {e}")))?;

    match event.into_post() {
        Some(post) => {
            let router = Arc::clone(&state.router);
            tokio::spawn(async move { router.handle(post).await });
        }
        None => debug!("Ignoring webhook event without a post"),
    }

    Ok(StatusCode::OK.into_response())
}

/// Query string of the OAuth redirect.
#[derive(Debug, Deserialize)]
pub struct OAuthQuery {
    pub code: Option<String>,
}

/// GET /oauth - OAuth redirect target.
///
/// Exchanges the authorization code, learns the bot's own id and registers
/// the webhook.
pub async fn oauth(
    State(state): State<Arc<AppState>>,
    Query(query): Query<OAuthQuery>,
) -> Result<Response, ApiError> {
    let chat = state
        .chat
        .as_ref()
        .ok_or_else(|| ApiError::unavailable("chat client is not configured"))?;
    let code = query
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::bad_request("missing authorization code"))?;

    chat.login_with_code(&code).await?;

    match chat.me().await {
        Ok(me) => state.router.set_bot_id(me.id.clone()),
        Err(e) => warn!("Could not look up own identity: {}", e),
    }

    if state.events_uri.is_empty() {
        warn!("chat.events_uri is not set, skipping webhook registration");
    } else {
        chat.subscribe_webhook(
            &state.events_uri,
            DEFAULT_EVENT_FILTERS,
            DEFAULT_WEBHOOK_EXPIRES_IN,
        )
        .await?;
    }

    info!("Bot authorized");
    Ok((StatusCode::OK, "Bot authorized").into_response())
}
