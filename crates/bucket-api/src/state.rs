use std::sync::Arc;

use anyhow::anyhow;
use bucket_crypto::{cipher::TokenCipher, secrets::SecretHasher};
use bucket_db::Database;
use bucket_db::models::UserRow;
use bucket_types::api::SessionClaims;
use uuid::Uuid;

use crate::email::EmailSender;
use crate::error::ApiError;
use crate::payid::IdentityProvider;
use crate::rate_limit::RateLimiter;
use crate::session::SessionIssuer;

pub type AppState = Arc<AppStateInner>;

/// Everything a handler needs, built once at startup.
pub struct AppStateInner {
    pub db: Database,
    pub sessions: SessionIssuer,
    pub cipher: TokenCipher,
    pub hasher: SecretHasher,
    pub email: Arc<dyn EmailSender>,
    pub payid: Arc<dyn IdentityProvider>,
    pub report_limiter: Arc<dyn RateLimiter>,
    pub settings: Settings,
}

#[derive(Debug, Clone)]
pub struct Settings {
    /// Public origin without a trailing slash.
    pub app_url: String,
    pub secure_cookies: bool,
}

impl Settings {
    pub fn new(app_url: &str) -> Self {
        let app_url = app_url.trim_end_matches('/').to_string();
        Self {
            secure_cookies: app_url.starts_with("https://"),
            app_url,
        }
    }
}

impl AppStateInner {
    /// Argon2 is deliberately slow; keep it off the async workers.
    pub async fn hash_secret(&self, secret: String) -> Result<String, ApiError> {
        let hasher = self.hasher.clone();
        let hash = tokio::task::spawn_blocking(move || hasher.hash(&secret))
            .await
            .map_err(|e| anyhow!("Hashing task failed: {}", e))??;
        Ok(hash)
    }

    pub async fn verify_secret(&self, secret: String, stored: String) -> Result<bool, ApiError> {
        let hasher = self.hasher.clone();
        let matches = tokio::task::spawn_blocking(move || hasher.verify(&secret, &stored))
            .await
            .map_err(|e| anyhow!("Verification task failed: {}", e))??;
        Ok(matches)
    }

    /// Load the account behind a validated session.
    pub fn session_user(&self, claims: &SessionClaims) -> Result<UserRow, ApiError> {
        self.db
            .get_user_by_id(&claims.sub.to_string())?
            .ok_or_else(|| ApiError::NotFound("User not found".into()))
    }

    /// Issue a session credential for a stored user.
    pub fn issue_session(&self, user: &UserRow) -> Result<String, ApiError> {
        let user_id = parse_user_id(&user.id)?;
        let token = self
            .sessions
            .issue(user_id, &user.email, vec![user.role.clone()])?;
        Ok(token)
    }
}

pub(crate) fn parse_user_id(raw: &str) -> Result<Uuid, ApiError> {
    raw.parse()
        .map_err(|e| ApiError::Internal(anyhow!("Stored user id {} is not a UUID: {}", raw, e)))
}
