//! HTTP client for the chat platform REST API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, warn};

use super::port::ChatPort;
use super::token_cache::{AuthToken, TokenCache, TokenResponse};
use super::types::{Group, OutboundMessage, Person, WebhookSubscription};
use crate::config::ChatConfig;
use crate::{BotError, Result};

/// Event filters registered by [`ChatClient::subscribe_webhook`] by default.
pub const DEFAULT_EVENT_FILTERS: &[&str] =
    &["/restapi/v1.0/glip/posts", "/restapi/v1.0/glip/groups"];

/// Default lifetime requested for a webhook subscription (about 15 years,
/// the platform maximum for bots).
pub const DEFAULT_WEBHOOK_EXPIRES_IN: u64 = 500_000_000;

const TOKEN_PATH: &str = "/restapi/oauth/token";

/// Chat platform client.
pub struct ChatClient {
    http: Client,
    server_url: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    cache: Arc<dyn TokenCache>,
    token: Mutex<Option<AuthToken>>,
    me: OnceCell<Person>,
}

impl ChatClient {
    /// Create a client, loading any previously cached token.
    pub fn new(config: &ChatConfig, cache: Arc<dyn TokenCache>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BotError::Chat(format!("failed to create HTTP client: {e}")))?;

        let token = match cache.load() {
            Ok(token) => token,
            Err(e) => {
                warn!("Ignoring unreadable token cache: {}", e);
                None
            }
        };
        if token.is_some() {
            info!("Loaded cached chat token");
        }

        Ok(Self {
            http,
            server_url: config.server_url.trim_end_matches('/').to_string(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            cache,
            token: Mutex::new(token),
            me: OnceCell::new(),
        })
    }

    /// Whether a token is available.
    pub async fn is_authorized(&self) -> bool {
        self.token.lock().await.is_some()
    }

    /// Exchange an OAuth authorization code for a token and store it.
    pub async fn login_with_code(&self, code: &str) -> Result<()> {
        let token = self
            .request_token(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
            ])
            .await?;
        info!(owner_id = ?token.owner_id, "Chat login succeeded");
        self.store_token(token).await
    }

    /// The bot's own person record. Fetched once, then cached.
    pub async fn me(&self) -> Result<&Person> {
        self.me
            .get_or_try_init(|| async {
                self.send_json::<Person>(self.request(Method::GET, "/restapi/v1.0/glip/persons/~"))
                    .await
            })
            .await
    }

    /// Open (or find) the private chat between the bot and `person_id`.
    pub async fn create_or_get_private_group(&self, person_id: &str) -> Result<Group> {
        let me = self.me().await?;
        let body = json!({
            "type": "PrivateChat",
            "members": [person_id, me.id],
        });
        self.send_json(self.request(Method::POST, "/restapi/v1.0/glip/groups").json(&body))
            .await
    }

    /// Post directly to a person through their private chat.
    pub async fn post_to_person(&self, person_id: &str, message: &OutboundMessage) -> Result<()> {
        let group = self.create_or_get_private_group(person_id).await?;
        self.post_to_group(&group.id, message).await
    }

    /// Register `address` to receive webhook notifications for `event_filters`.
    pub async fn subscribe_webhook(
        &self,
        address: &str,
        event_filters: &[&str],
        expires_in: u64,
    ) -> Result<WebhookSubscription> {
        let body = json!({
            "eventFilters": event_filters,
            "deliveryMode": {
                "transportType": "WebHook",
                "address": address,
            },
            "expiresIn": expires_in,
        });
        let subscription: WebhookSubscription = self
            .send_json(self.request(Method::POST, "/restapi/v1.0/subscription").json(&body))
            .await?;
        info!(subscription_id = %subscription.id, address = %address, "Webhook registered");
        Ok(subscription)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.server_url, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, self.url(path))
    }

    async fn request_token(&self, form: &[(&str, &str)]) -> Result<AuthToken> {
        let response = self
            .http
            .post(self.url(TOKEN_PATH))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(form)
            .send()
            .await
            .map_err(|e| BotError::Chat(format!("token request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BotError::Auth(format!("token request rejected: HTTP {status}: {body}")));
        }

        let parsed: TokenResponse = response
            .json()
            .await
            .map_err(|e| BotError::Auth(format!("invalid token response: {e}")))?;
        AuthToken::from_response(parsed, Utc::now())
    }

    async fn store_token(&self, token: AuthToken) -> Result<()> {
        if let Err(e) = self.cache.save(&token) {
            warn!("Failed to persist chat token: {}", e);
        }
        *self.token.lock().await = Some(token);
        Ok(())
    }

    /// A usable access token, refreshing it first if it has expired.
    async fn access_token(&self) -> Result<String> {
        let mut guard = self.token.lock().await;
        let token = guard
            .as_ref()
            .ok_or_else(|| BotError::Auth("chat client is not authorized".to_string()))?;

        let now = Utc::now();
        if !token.is_expired(now) {
            return Ok(token.access_token.clone());
        }
        if !token.can_refresh(now) {
            return Err(BotError::Auth(
                "chat token expired and cannot be refreshed".to_string(),
            ));
        }

        debug!("Refreshing chat access token");
        let refresh_token = token.refresh_token.clone().unwrap_or_default();
        let refreshed = self
            .request_token(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.as_str()),
            ])
            .await?;
        if let Err(e) = self.cache.save(&refreshed) {
            warn!("Failed to persist chat token: {}", e);
        }
        let access = refreshed.access_token.clone();
        *guard = Some(refreshed);
        Ok(access)
    }

    async fn send(&self, builder: RequestBuilder) -> Result<reqwest::Response> {
        let access = self.access_token().await?;
        let response = builder
            .bearer_auth(access)
            .send()
            .await
            .map_err(|e| BotError::Chat(format!("request failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let url = response.url().path().to_string();
        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::UNAUTHORIZED {
            return Err(BotError::Auth(format!("{url}: HTTP {status}: {body}")));
        }
        Err(BotError::Chat(format!("{url}: HTTP {status}: {body}")))
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        self.send(builder)
            .await?
            .json()
            .await
            .map_err(|e| BotError::Chat(format!("invalid response body: {e}")))
    }
}

#[async_trait]
impl ChatPort for ChatClient {
    async fn post_to_group(&self, group_id: &str, message: &OutboundMessage) -> Result<()> {
        let path = format!(
            "/restapi/v1.0/glip/groups/{}/posts",
            urlencoding::encode(group_id)
        );
        self.send(self.request(Method::POST, &path).json(message))
            .await?;
        debug!(group_id = %group_id, cards = message.attachments.len(), "Posted to group");
        Ok(())
    }
}
