//! OAuth token persistence.

use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{BotError, Result};

/// Seconds before expiry at which a token is treated as expired.
const EXPIRY_SKEW_SECS: i64 = 60;

/// A stored OAuth token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
    pub access_token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
    pub refresh_token: Option<String>,
    pub refresh_token_expires_at: Option<DateTime<Utc>>,
    /// Extension id of the authorized bot.
    pub owner_id: Option<String>,
}

/// Token endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub expires_in: i64,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub refresh_token_expires_in: Option<i64>,
    #[serde(default)]
    pub owner_id: Option<String>,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

fn expiry(now: DateTime<Utc>, secs: i64) -> Result<DateTime<Utc>> {
    Duration::try_seconds(secs)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .ok_or_else(|| BotError::Auth(format!("token lifetime out of range: {secs}s")))
}

impl AuthToken {
    /// Build a token from an endpoint response received at `now`.
    ///
    /// Lifetimes that do not fit a timestamp are rejected as an auth error.
    pub fn from_response(response: TokenResponse, now: DateTime<Utc>) -> Result<Self> {
        let expires_at = expiry(now, response.expires_in)?;
        let refresh_token_expires_at = response
            .refresh_token_expires_in
            .map(|secs| expiry(now, secs))
            .transpose()?;
        Ok(Self {
            access_token: response.access_token,
            token_type: response.token_type,
            expires_at,
            refresh_token: response.refresh_token,
            refresh_token_expires_at,
            owner_id: response.owner_id,
        })
    }

    /// Whether the access token must be refreshed at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_SKEW_SECS) >= self.expires_at
    }

    /// Whether the refresh token can still be used at `now`.
    pub fn can_refresh(&self, now: DateTime<Utc>) -> bool {
        match (&self.refresh_token, self.refresh_token_expires_at) {
            (Some(_), Some(expires)) => now < expires,
            (Some(_), None) => true,
            _ => false,
        }
    }
}

/// Persistence for the chat client's token: loaded at startup, saved on
/// every login and refresh.
pub trait TokenCache: Send + Sync {
    /// Load the stored token, if any.
    fn load(&self) -> Result<Option<AuthToken>>;
    /// Replace the stored token.
    fn save(&self, token: &AuthToken) -> Result<()>;
}

/// Token cache backed by a JSON file.
pub struct FileTokenCache {
    path: PathBuf,
}

impl FileTokenCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TokenCache for FileTokenCache {
    fn load(&self) -> Result<Option<AuthToken>> {
        if !self.path.exists() {
            debug!("No token cache at {:?}", self.path);
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)?;
        let token = serde_json::from_str(&content)
            .map_err(|e| BotError::Config(format!("corrupt token cache {:?}: {e}", self.path)))?;
        Ok(Some(token))
    }

    fn save(&self, token: &AuthToken) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(token)
            .map_err(|e| BotError::Config(format!("failed to encode token: {e}")))?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

/// In-process token cache.
#[derive(Default)]
pub struct MemoryTokenCache {
    token: Mutex<Option<AuthToken>>,
}

impl MemoryTokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with `token` already stored.
    pub fn with_token(token: AuthToken) -> Self {
        Self {
            token: Mutex::new(Some(token)),
        }
    }
}

impl TokenCache for MemoryTokenCache {
    fn load(&self) -> Result<Option<AuthToken>> {
        let guard = self
            .token
            .lock()
            .map_err(|_| BotError::Config("token cache lock poisoned".to_string()))?;
        Ok(guard.clone())
    }

    fn save(&self, token: &AuthToken) -> Result<()> {
        let mut guard = self
            .token
            .lock()
            .map_err(|_| BotError::Config("token cache lock poisoned".to_string()))?;
        *guard = Some(token.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample(now: DateTime<Utc>) -> AuthToken {
        AuthToken::from_response(
            TokenResponse {
                access_token: "access".to_string(),
                token_type: "bearer".to_string(),
                expires_in: 3600,
                refresh_token: Some("refresh".to_string()),
                refresh_token_expires_in: Some(604800),
                owner_id: Some("42".to_string()),
            },
            now,
        )
        .unwrap()
    }

    #[test]
    fn test_expiry() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let token = sample(now);

        assert!(!token.is_expired(now));
        assert!(token.is_expired(now + Duration::seconds(3550)));
        assert!(token.can_refresh(now + Duration::days(6)));
        assert!(!token.can_refresh(now + Duration::days(8)));
    }

    #[test]
    fn test_out_of_range_lifetime_is_rejected() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let response = |expires_in, refresh_in| TokenResponse {
            access_token: "access".to_string(),
            token_type: "bearer".to_string(),
            expires_in,
            refresh_token: Some("refresh".to_string()),
            refresh_token_expires_in: refresh_in,
            owner_id: None,
        };

        let err = AuthToken::from_response(response(i64::MAX, None), now).unwrap_err();
        assert!(matches!(err, BotError::Auth(_)));

        let err = AuthToken::from_response(response(3600, Some(i64::MAX / 2)), now).unwrap_err();
        assert!(matches!(err, BotError::Auth(_)));
    }

    #[test]
    fn test_file_cache_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileTokenCache::new(dir.path().join("sub").join("token.json"));

        assert!(cache.load().unwrap().is_none());

        let token = sample(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
        cache.save(&token).unwrap();
        assert_eq!(cache.load().unwrap(), Some(token));
    }

    #[test]
    fn test_file_cache_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, "not json").unwrap();

        let result = FileTokenCache::new(&path).load();
        assert!(matches!(result, Err(BotError::Config(_))));
    }

    #[test]
    fn test_memory_cache() {
        let cache = MemoryTokenCache::new();
        assert!(cache.load().unwrap().is_none());

        let token = sample(Utc::now());
        cache.save(&token).unwrap();
        assert_eq!(cache.load().unwrap(), Some(token));
    }
}
