//! OTP and magic-link issuance and redemption.
//!
//! Only an Argon2 hash of each secret is stored. Redemption is single use:
//! of any number of concurrent redeemers holding the right secret, exactly
//! one wins the conditional delete.

use axum::{
    Json,
    extract::{Query, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use bucket_crypto::secrets::{generate_link_secret, generate_otp};
use bucket_db::models::{NewUser, UserRow};
use bucket_types::api::{
    ApiResponse, MagicLinkQuery, OtpVerifyRequest, RedirectData, TokenRequest,
};
use bucket_types::models::VerificationPurpose;
use chrono::Utc;
use reqwest::Url;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::auth::{normalize_email, start_session};
use crate::email;
use crate::error::ApiError;
use crate::redirect::{self, safe_return_path};
use crate::state::{AppState, AppStateInner, Settings};

/// Issue a fresh secret for `email`, replacing any earlier one of the same
/// purpose, and mail it. A token whose mail could not be sent is withdrawn.
pub async fn request_token(
    state: &AppStateInner,
    email: &str,
    purpose: VerificationPurpose,
    should_create: bool,
    return_url: Option<&str>,
) -> Result<(), ApiError> {
    let email = normalize_email(email)?;

    if !should_create && state.db.get_user_by_email(&email)?.is_none() {
        return Err(ApiError::NotFound("No account found with this email".into()));
    }

    let secret = match purpose {
        VerificationPurpose::Otp => generate_otp(),
        VerificationPurpose::MagicLink => generate_link_secret(),
    };
    let token_hash = state.hash_secret(secret.clone()).await?;
    let expires_at = (Utc::now() + purpose.ttl()).timestamp();
    let token_id = state
        .db
        .replace_verification_token(&email, purpose, &token_hash, expires_at)?;

    let message = match purpose {
        VerificationPurpose::Otp => email::otp_email(&email, &secret),
        VerificationPurpose::MagicLink => {
            let link = magic_link_url(&state.settings, &email, &secret, return_url)?;
            email::magic_link_email(&email, &link)
        }
    };

    if let Err(e) = state.email.send(message).await {
        error!("Failed to send {} to {}: {:#}", purpose.as_str(), email, e);
        if let Err(e) = state.db.delete_verification_token(token_id) {
            error!("Failed to withdraw undelivered token {}: {:#}", token_id, e);
        }
        return Err(ApiError::DispatchFailed);
    }

    info!("Issued {} for {}", purpose.as_str(), email);
    Ok(())
}

/// Redeem `secret` for `email` and return the verified account, creating it
/// on first use.
pub async fn redeem_token(
    state: &AppStateInner,
    email: &str,
    purpose: VerificationPurpose,
    secret: &str,
) -> Result<UserRow, ApiError> {
    let email = normalize_email(email)?;
    let secret = secret.trim();
    if secret.is_empty() {
        return Err(ApiError::Validation("Verification code is required".into()));
    }

    let token = state
        .db
        .find_live_verification_token(&email, purpose, Utc::now().timestamp())?
        .ok_or(ApiError::InvalidOrExpired)?;

    if !state
        .verify_secret(secret.to_string(), token.token_hash.clone())
        .await?
    {
        return Err(ApiError::InvalidCode);
    }

    // Lost the race to a concurrent redeemer.
    if !state.db.delete_verification_token(token.id)? {
        return Err(ApiError::InvalidOrExpired);
    }

    let user = resolve_verified_user(state, &email)?;
    info!("Redeemed {} for user {}", purpose.as_str(), user.id);
    Ok(user)
}

fn resolve_verified_user(state: &AppStateInner, email: &str) -> Result<UserRow, ApiError> {
    let user_id = match state.db.get_user_by_email(email)? {
        Some(user) if user.email_verified => return Ok(user),
        Some(user) => user.id,
        None => {
            let id = Uuid::new_v4().to_string();
            let new_user = NewUser {
                email: email.to_string(),
                email_verified: true,
                ..Default::default()
            };
            if state.db.create_user(&id, &new_user)? {
                info!("Created user {} via email verification", id);
                id
            } else {
                state
                    .db
                    .get_user_by_email(email)?
                    .ok_or_else(|| anyhow::anyhow!("User {} vanished after conflict", email))?
                    .id
            }
        }
    };

    state.db.mark_email_verified(&user_id)?;
    let user = state
        .db
        .get_user_by_id(&user_id)?
        .ok_or_else(|| anyhow::anyhow!("User {} vanished after verification", user_id))?;
    Ok(user)
}

fn magic_link_url(
    settings: &Settings,
    email: &str,
    secret: &str,
    return_url: Option<&str>,
) -> Result<String, ApiError> {
    let mut url = Url::parse(&format!("{}/api/v1/auth/magic-link/verify", settings.app_url))
        .map_err(|e| anyhow::anyhow!("Invalid app URL {}: {}", settings.app_url, e))?;
    url.query_pairs_mut()
        .append_pair("email", email)
        .append_pair("token", secret)
        .append_pair("returnUrl", &safe_return_path(return_url));
    Ok(url.into())
}

/// POST /api/v1/auth/otp/request
pub async fn request_otp(
    State(state): State<AppState>,
    Json(req): Json<TokenRequest>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    request_token(&state, &req.email, VerificationPurpose::Otp, req.should_create, None).await?;
    Ok(Json(ApiResponse::message(
        "An OTP has been sent to your email address",
    )))
}

/// POST /api/v1/auth/otp/verify
pub async fn verify_otp(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<OtpVerifyRequest>,
) -> Result<Response, ApiError> {
    let user = redeem_token(&state, &req.email, VerificationPurpose::Otp, &req.otp).await?;
    let response_headers = start_session(&state, &headers, &user)?;
    let redirect_url = safe_return_path(req.return_url.as_deref());

    Ok((
        response_headers,
        Json(ApiResponse::ok(
            "Verification successful",
            RedirectData { redirect_url },
        )),
    )
        .into_response())
}

/// POST /api/v1/auth/magic-link/request
pub async fn request_magic_link(
    State(state): State<AppState>,
    Json(req): Json<TokenRequest>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    request_token(
        &state,
        &req.email,
        VerificationPurpose::MagicLink,
        req.should_create,
        req.return_url.as_deref(),
    )
    .await?;
    Ok(Json(ApiResponse::message(
        "A magic link has been sent to your email address",
    )))
}

/// GET /api/v1/auth/magic-link/verify
///
/// Browser-facing: every outcome is a redirect.
pub async fn verify_magic_link(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<MagicLinkQuery>,
) -> Response {
    let (Some(email), Some(token)) = (query.email.as_deref(), query.token.as_deref()) else {
        return redirect::to_error_page(&state.settings, "Missing magic link parameters");
    };

    let user = match redeem_token(&state, email, VerificationPurpose::MagicLink, token).await {
        Ok(user) => user,
        Err(ApiError::InvalidCode | ApiError::InvalidOrExpired) => {
            return redirect::to_error_page(&state.settings, "Magic link expired or invalid");
        }
        Err(ApiError::Validation(message)) => {
            return redirect::to_error_page(&state.settings, &message);
        }
        Err(e) => {
            error!("Magic link verification failed: {:?}", e);
            return redirect::to_error_page(&state.settings, "Internal server error");
        }
    };

    match start_session(&state, &headers, &user) {
        Ok(cookies) => {
            let target = safe_return_path(query.return_url.as_deref());
            (cookies, redirect::to_app(&state.settings, &target)).into_response()
        }
        Err(e) => {
            warn!("Could not start session for {}: {:?}", user.id, e);
            redirect::to_error_page(&state.settings, "Internal server error")
        }
    }
}
