use anyhow::Result;
use axum::http::{HeaderMap, HeaderValue, header};
use axum_extra::extract::CookieJar;
use bucket_types::api::SessionClaims;
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use crate::state::Settings;

pub const SESSION_COOKIE: &str = "auth-token";
pub const SESSION_TTL_DAYS: i64 = 7;

/// Signs and validates the HS256 session credential.
#[derive(Clone)]
pub struct SessionIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SessionIssuer {
    pub fn new(secret: &[u8; 32]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }

    pub fn issue(&self, user_id: Uuid, email: &str, roles: Vec<String>) -> Result<String> {
        self.issue_at(user_id, email, roles, Utc::now().timestamp())
    }

    /// Issue a credential as if it were minted at `issued_at` (unix seconds).
    pub fn issue_at(
        &self,
        user_id: Uuid,
        email: &str,
        roles: Vec<String>,
        issued_at: i64,
    ) -> Result<String> {
        let exp = issued_at + Duration::days(SESSION_TTL_DAYS).num_seconds();
        let claims = SessionClaims {
            sub: user_id,
            email: email.to_string(),
            roles,
            iat: issued_at.max(0) as usize,
            exp: exp.max(0) as usize,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        Ok(token)
    }

    /// Forged, expired and malformed credentials all come back as `None`.
    pub fn validate(&self, token: &str) -> Option<SessionClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        decode::<SessionClaims>(token, &self.decoding, &validation)
            .ok()
            .map(|data| data.claims)
    }
}

/// Bearer header first, then the raw `auth-token` header, then the cookie.
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        if let Some(token) = value.trim().strip_prefix("Bearer ") {
            return Some(token.trim().to_string());
        }
    }
    if let Some(value) = headers.get(SESSION_COOKIE).and_then(|v| v.to_str().ok()) {
        let value = value.trim();
        let value = value.strip_prefix("Bearer ").unwrap_or(value);
        if !value.is_empty() {
            return Some(value.to_string());
        }
    }
    CookieJar::from_headers(headers)
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
}

pub fn session_cookie(settings: &Settings, token: &str) -> Result<HeaderValue> {
    cookie_header(
        settings,
        SESSION_COOKIE,
        token,
        Duration::days(SESSION_TTL_DAYS).num_seconds(),
    )
}

pub fn clear_session_cookie(settings: &Settings) -> Result<HeaderValue> {
    cookie_header(settings, SESSION_COOKIE, "", 0)
}

/// `HttpOnly; SameSite=Lax` cookie for the whole origin, `Secure` behind https.
pub(crate) fn cookie_header(
    settings: &Settings,
    name: &str,
    value: &str,
    max_age_secs: i64,
) -> Result<HeaderValue> {
    let mut cookie =
        format!("{name}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_secs}");
    if settings.secure_cookies {
        cookie.push_str("; Secure");
    }
    Ok(HeaderValue::from_str(&cookie)?)
}
