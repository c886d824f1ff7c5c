//! PayID authorization-code flow with PKCE.
//!
//! `initiate` stores a single-use handshake keyed by `state`; `callback` takes
//! it back atomically, checks the CSRF nonce, exchanges the code and upserts
//! the local account. The callback always answers with a redirect.

use axum::{
    Json,
    body::Bytes,
    extract::{Query, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use bucket_crypto::pkce::{PkcePair, StatePayload, decode_state, encode_state, generate_csrf};
use bucket_db::models::{OAuthSessionRow, PayIdUpsert, UserRow};
use bucket_types::api::{
    ApiResponse, OAuthCallbackQuery, OAuthInitiateRequest, OAuthInitiateResponse,
    ProviderMagicLinkRequest,
};
use chrono::{Duration, Utc};
use serde_json::Value;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::auth::{normalize_email, start_session};
use crate::error::ApiError;
use crate::payid::{ExternalProfile, MagicLinkDispatch, ProviderError, TokenSet};
use crate::redirect::{self, safe_return_path};
use crate::referrals::referral_cookie_value;
use crate::state::{AppState, AppStateInner};

/// How long an unanswered handshake stays redeemable.
pub const HANDSHAKE_TTL_MINUTES: i64 = 10;

/// Why a callback was turned away. The display text is shown to the user.
#[derive(Debug, thiserror::Error)]
pub enum CallbackRejection {
    #[error("Missing authorization code or state")]
    MissingParameters,

    #[error("Invalid or expired session")]
    InvalidOrExpiredSession,

    #[error("CSRF validation failed")]
    CsrfMismatch,

    #[error("Authentication with PayID failed")]
    ExchangeFailed(#[source] ProviderError),

    #[error("OAuth callback failed")]
    Internal(#[source] anyhow::Error),
}

/// Persist a fresh PKCE handshake and return the provider authorization URL.
pub fn begin_handshake(
    state: &AppStateInner,
    referral_id: Option<String>,
    return_url: Option<String>,
) -> Result<String, ApiError> {
    let pkce = PkcePair::generate();
    let csrf = generate_csrf();
    let state_param = encode_state(&StatePayload { csrf: csrf.clone() })?;
    let authorization_url = state.payid.authorization_url(&pkce.challenge, &state_param)?;

    state.db.create_oauth_session(&OAuthSessionRow {
        state: state_param,
        code_verifier: pkce.verifier,
        csrf,
        referral_id,
        return_url,
        expires_at: (Utc::now() + Duration::minutes(HANDSHAKE_TTL_MINUTES)).timestamp(),
    })?;
    Ok(authorization_url)
}

/// Consume the handshake for `state_param` and sign the user in at PayID's word.
pub async fn complete_handshake(
    state: &AppStateInner,
    code: Option<&str>,
    state_param: Option<&str>,
) -> Result<(UserRow, Option<String>), CallbackRejection> {
    let code = code.filter(|c| !c.is_empty());
    let state_param = state_param.filter(|s| !s.is_empty());
    let (Some(code), Some(state_param)) = (code, state_param) else {
        return Err(CallbackRejection::MissingParameters);
    };

    // Taking the row deletes it, so every path below is single use.
    let session = state
        .db
        .take_oauth_session(state_param)
        .map_err(CallbackRejection::Internal)?
        .ok_or(CallbackRejection::InvalidOrExpiredSession)?;
    if session.expires_at <= Utc::now().timestamp() {
        return Err(CallbackRejection::InvalidOrExpiredSession);
    }

    match decode_state(state_param) {
        Ok(payload) if payload.csrf == session.csrf => {}
        _ => return Err(CallbackRejection::CsrfMismatch),
    }

    let tokens = state
        .payid
        .exchange_code(code, &session.code_verifier)
        .await
        .map_err(CallbackRejection::ExchangeFailed)?;
    let profile = state
        .payid
        .user_info(&tokens.access_token)
        .await
        .map_err(CallbackRejection::ExchangeFailed)?;

    let user = upsert_from_external_profile(state, &profile, &tokens, session.referral_id)
        .map_err(|e| match e {
            ApiError::Internal(inner) => CallbackRejection::Internal(inner),
            other => CallbackRejection::Internal(anyhow::anyhow!("{}", other)),
        })?;
    Ok((user, session.return_url))
}

/// Create or refresh the local account for a PayID profile.
///
/// Provider tokens are encrypted before they reach the store. A carried
/// referrer is bound only if the account has none and it is not the account itself.
pub fn upsert_from_external_profile(
    state: &AppStateInner,
    profile: &ExternalProfile,
    tokens: &TokenSet,
    referral_id: Option<String>,
) -> Result<UserRow, ApiError> {
    let email = normalize_email(&profile.email)?;
    let encrypt = |raw: &Option<String>| -> Result<Option<String>, ApiError> {
        Ok(match raw {
            Some(token) => Some(state.cipher.encrypt(token)?),
            None => None,
        })
    };

    let upsert = PayIdUpsert {
        email,
        first_name: profile.given_name.clone(),
        last_name: profile.family_name.clone(),
        picture: profile.picture.clone(),
        phone: profile.phone.clone(),
        pay_tag: profile.pay_tag.clone(),
        email_verified: profile.email_verified,
        phone_verified: profile.phone_verified,
        access_token: state.cipher.encrypt(&tokens.access_token)?,
        refresh_token: encrypt(&tokens.refresh_token)?,
        id_token: encrypt(&tokens.id_token)?,
        sub: profile.sub.clone(),
        kyc_verified: profile.kyc_verified,
        verification_level: profile.verification_level.clone(),
        referral_id,
    };

    let user = state
        .db
        .upsert_payid_user(&Uuid::new_v4().to_string(), &upsert)?;
    Ok(user)
}

/// POST /api/v1/payid/oauth/initiate
pub async fn initiate(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ApiResponse<OAuthInitiateResponse>>, ApiError> {
    // The body is optional; a malformed one is treated as empty.
    let req: OAuthInitiateRequest = if body.is_empty() {
        OAuthInitiateRequest::default()
    } else {
        serde_json::from_slice(&body).unwrap_or_else(|e| {
            debug!("Ignoring unreadable initiate body: {}", e);
            OAuthInitiateRequest::default()
        })
    };

    let mut referral_id = None;
    if let Some(tag) = req.referral.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        match state.db.get_user_by_pay_tag(tag)? {
            Some(referrer) => referral_id = Some(referrer.id),
            None => debug!("Unknown referral tag {} on OAuth initiate", tag),
        }
    }
    let referral_id = referral_id.or_else(|| referral_cookie_value(&headers));
    let return_url = req
        .return_url
        .as_deref()
        .map(|raw| safe_return_path(Some(raw)));

    let authorization_url = begin_handshake(&state, referral_id, return_url)?;
    Ok(Json(ApiResponse::ok(
        "OAuth authorization URL generated",
        OAuthInitiateResponse { authorization_url },
    )))
}

/// GET /callback/payid
pub async fn callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<OAuthCallbackQuery>,
) -> Response {
    let outcome =
        complete_handshake(&state, query.code.as_deref(), query.state.as_deref()).await;

    let (user, return_url) = match outcome {
        Ok(done) => done,
        Err(rejection) => {
            match &rejection {
                CallbackRejection::ExchangeFailed(e) => warn!("PayID exchange failed: {}", e),
                CallbackRejection::Internal(e) => error!("OAuth callback failed: {:#}", e),
                other => warn!("OAuth callback rejected: {}", other),
            }
            return redirect::to_error_page(&state.settings, &rejection.to_string());
        }
    };

    match start_session(&state, &headers, &user) {
        Ok(cookies) => {
            info!("User {} signed in with PayID", user.id);
            let target = safe_return_path(return_url.as_deref());
            (cookies, redirect::to_app(&state.settings, &target)).into_response()
        }
        Err(e) => {
            error!("Could not start session for {}: {:?}", user.id, e);
            redirect::to_error_page(&state.settings, "OAuth callback failed")
        }
    }
}

/// POST /api/v1/payid/oauth/login/magic-link/request
///
/// PayID mails the link; following it lands on our authorization URL.
pub async fn request_provider_magic_link(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ProviderMagicLinkRequest>,
) -> Result<Json<ApiResponse<Value>>, ApiError> {
    let email = normalize_email(&req.email)?;
    let authorization_url = begin_handshake(&state, referral_cookie_value(&headers), None)?;

    let data = state
        .payid
        .request_magic_link(&MagicLinkDispatch {
            email,
            should_create: req.should_create,
            first_name: req.first_name,
            last_name: req.last_name,
            return_url: authorization_url,
        })
        .await?;

    Ok(Json(ApiResponse::ok(
        "PayID magic link dispatched successfully",
        data,
    )))
}
