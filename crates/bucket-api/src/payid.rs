//! PayID OAuth / KYC client.
//!
//! Handlers only see the [`IdentityProvider`] trait. Token arguments are the
//! plaintext provider tokens; decryption happens before the call.

use std::time::Duration;

use async_trait::async_trait;
use bucket_types::models::KycStatus;
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

pub const OAUTH_SCOPES: &str = "openid profile email kyc:read";

#[derive(Debug, Clone)]
pub struct PayIdConfig {
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub org_id: String,
    pub timeout: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("PayID is not configured: {0}")]
    Unavailable(String),

    #[error("PayID request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("PayID rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
}

/// Profile returned by the userinfo endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ExternalProfile {
    pub sub: String,
    pub email: String,
    #[serde(default)]
    pub email_verified: bool,
    pub name: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub picture: Option<String>,
    pub phone: Option<String>,
    #[serde(default)]
    pub phone_verified: bool,
    pub pay_tag: Option<String>,
    #[serde(default)]
    pub kyc_verified: bool,
    pub verification_level: Option<String>,
}

/// KYC submission. The organisation id is added by the client.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KycRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub date_of_birth: String,
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gave_consent: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<KycAddress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_number_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KycAddress {
    pub street: String,
    pub street2: String,
    pub city: String,
    pub region: String,
    pub postal_code: String,
    pub country: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KycResult {
    pub session_id: String,
    pub status: KycStatus,
    pub provider: String,
    pub verification_level: Option<String>,
    pub shareable_url: Option<String>,
}

/// Ask PayID to e-mail a login link that lands on `return_url`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MagicLinkDispatch {
    pub email: String,
    pub should_create: bool,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(rename = "return_url")]
    pub return_url: String,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Authorization endpoint URL for an S256 PKCE challenge.
    fn authorization_url(&self, code_challenge: &str, state: &str) -> Result<String, ProviderError>;

    async fn exchange_code(&self, code: &str, code_verifier: &str)
    -> Result<TokenSet, ProviderError>;

    async fn user_info(&self, access_token: &str) -> Result<ExternalProfile, ProviderError>;

    async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, ProviderError>;

    async fn start_kyc(
        &self,
        access_token: &str,
        request: &KycRequest,
    ) -> Result<KycResult, ProviderError>;

    async fn kyc_status(
        &self,
        access_token: &str,
        session_id: Option<&str>,
    ) -> Result<KycResult, ProviderError>;

    async fn retry_kyc(&self, access_token: &str, session_id: &str)
    -> Result<KycResult, ProviderError>;

    async fn request_magic_link(&self, request: &MagicLinkDispatch) -> Result<Value, ProviderError>;
}

/// HTTP implementation. Built without config it fails every call with
/// [`ProviderError::Unavailable`].
pub struct PayIdClient {
    client: Client,
    config: Option<PayIdConfig>,
}

impl PayIdClient {
    pub fn new(config: PayIdConfig) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            config: Some(config),
        })
    }

    pub fn disabled() -> Self {
        Self {
            client: Client::new(),
            config: None,
        }
    }

    fn config(&self) -> Result<&PayIdConfig, ProviderError> {
        self.config
            .as_ref()
            .ok_or_else(|| ProviderError::Unavailable("PAYID_API_URL is not set".into()))
    }

    fn url(&self, path: &str) -> Result<String, ProviderError> {
        let config = self.config()?;
        Ok(format!("{}{}", config.base_url.trim_end_matches('/'), path))
    }

    async fn token_request(&self, body: Value) -> Result<TokenSet, ProviderError> {
        let request = self.client.post(self.url("/oauth/token")?).json(&body);
        send_json(request, "Token request failed").await
    }
}

#[async_trait]
impl IdentityProvider for PayIdClient {
    fn authorization_url(&self, code_challenge: &str, state: &str) -> Result<String, ProviderError> {
        let config = self.config()?;
        let mut url = Url::parse(&self.url("/oauth/authorize")?)
            .map_err(|e| ProviderError::Unavailable(format!("invalid PAYID_API_URL: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("client_id", &config.client_id)
            .append_pair("redirect_uri", &config.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("code_challenge", code_challenge)
            .append_pair("code_challenge_method", "S256")
            .append_pair("state", state)
            .append_pair("scope", OAUTH_SCOPES);
        Ok(url.into())
    }

    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<TokenSet, ProviderError> {
        let config = self.config()?;
        self.token_request(serde_json::json!({
            "grant_type": "authorization_code",
            "code": code,
            "redirect_uri": config.redirect_uri,
            "client_id": config.client_id,
            "client_secret": config.client_secret,
            "code_verifier": code_verifier,
        }))
        .await
    }

    async fn user_info(&self, access_token: &str) -> Result<ExternalProfile, ProviderError> {
        let request = self
            .client
            .get(self.url("/oauth/userinfo")?)
            .bearer_auth(access_token);
        send_json(request, "Failed to fetch user info").await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, ProviderError> {
        let config = self.config()?;
        self.token_request(serde_json::json!({
            "grant_type": "refresh_token",
            "refresh_token": refresh_token,
            "redirect_uri": config.redirect_uri,
            "client_id": config.client_id,
            "client_secret": config.client_secret,
        }))
        .await
    }

    async fn start_kyc(
        &self,
        access_token: &str,
        request: &KycRequest,
    ) -> Result<KycResult, ProviderError> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Submission<'a> {
            organization_id: &'a str,
            #[serde(flatten)]
            request: &'a KycRequest,
        }

        let config = self.config()?;
        let body = Submission {
            organization_id: &config.org_id,
            request,
        };
        let request = self
            .client
            .post(self.url("/api/v1/kyc/verify")?)
            .bearer_auth(access_token)
            .json(&body);
        send_json(request, "KYC verification failed").await
    }

    async fn kyc_status(
        &self,
        access_token: &str,
        session_id: Option<&str>,
    ) -> Result<KycResult, ProviderError> {
        let path = match session_id {
            Some(id) => format!("/api/v1/kyc/verify/{}", id),
            None => "/api/v1/kyc/status".to_string(),
        };
        let request = self.client.get(self.url(&path)?).bearer_auth(access_token);
        send_json(request, "Failed to check KYC status").await
    }

    async fn retry_kyc(
        &self,
        access_token: &str,
        session_id: &str,
    ) -> Result<KycResult, ProviderError> {
        let path = format!("/api/v1/kyc/retry/{}", session_id);
        let request = self.client.post(self.url(&path)?).bearer_auth(access_token);
        send_json(request, "KYC retry failed").await
    }

    async fn request_magic_link(&self, dispatch: &MagicLinkDispatch) -> Result<Value, ProviderError> {
        let config = self.config()?;
        let request = self
            .client
            .post(self.url("/oauth/login/magic-link/request")?)
            .bearer_auth(&config.client_secret)
            .json(dispatch);
        send_json(request, "Failed to dispatch PayID magic link").await
    }
}

async fn send_json<T: serde::de::DeserializeOwned>(
    request: RequestBuilder,
    fallback: &str,
) -> Result<T, ProviderError> {
    let response = request.send().await?;
    if !response.status().is_success() {
        return Err(rejection(response, fallback).await);
    }
    Ok(response.json().await?)
}

/// Pull the provider's own error text out of a non-2xx response.
async fn rejection(response: Response, fallback: &str) -> ProviderError {
    let status = response.status().as_u16();
    let body: Option<Value> = response.json().await.ok();
    debug!("PayID returned {}: {:?}", status, body);

    let message = body
        .as_ref()
        .and_then(|b| {
            b.get("error_description")
                .or_else(|| b.pointer("/error/message"))
                .or_else(|| b.get("message"))
        })
        .and_then(Value::as_str)
        .unwrap_or(fallback)
        .to_string();
    ProviderError::Rejected { status, message }
}
