use axum::{Extension, Json, extract::State};
use bucket_db::models::UserRow;
use bucket_types::api::{ApiResponse, PayIdUserInfo, SessionClaims};
use tracing::{error, info, warn};

use crate::error::ApiError;
use crate::state::{AppState, AppStateInner};

/// Decrypted PayID access token for `user`, or `NotConnected`.
pub(crate) fn linked_access_token(state: &AppStateInner, user: &UserRow) -> Result<String, ApiError> {
    let encrypted = user
        .payid
        .as_ref()
        .and_then(|link| link.access_token.as_deref())
        .ok_or(ApiError::NotConnected)?;
    Ok(state.cipher.decrypt(encrypted)?)
}

/// GET /api/v1/payid/userinfo
pub async fn user_info(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
) -> Result<Json<ApiResponse<PayIdUserInfo>>, ApiError> {
    let user = state.session_user(&claims)?;
    let access_token = linked_access_token(&state, &user)?;
    let profile = state.payid.user_info(&access_token).await?;

    Ok(Json(ApiResponse::ok(
        "User information retrieved successfully",
        PayIdUserInfo {
            payid_sub: profile.sub,
            pay_tag: profile.pay_tag,
            email: profile.email,
            email_verified: profile.email_verified,
            name: profile.name,
            given_name: profile.given_name,
            family_name: profile.family_name,
            picture: profile.picture,
            phone: profile.phone,
            phone_verified: profile.phone_verified,
            kyc_verified: profile.kyc_verified,
            verification_level: profile.verification_level,
        },
    )))
}

/// POST /api/v1/payid/oauth/token/refresh
///
/// A refresh PayID refuses leaves the link without usable tokens.
pub async fn refresh_tokens(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let user = state.session_user(&claims)?;
    let stored = user
        .payid
        .as_ref()
        .ok_or(ApiError::NotConnected)?
        .refresh_token
        .clone()
        .ok_or_else(|| ApiError::Validation("No refresh token found".into()))?;

    let refreshed = match state.cipher.decrypt(&stored) {
        Ok(refresh_token) => state.payid.refresh(&refresh_token).await.map_err(|e| {
            warn!("PayID refused token refresh for {}: {}", user.id, e);
        }),
        Err(e) => {
            error!("Stored refresh token for {} is unreadable: {:#}", user.id, e);
            Err(())
        }
    };

    let Ok(tokens) = refreshed else {
        if let Err(e) = state.db.clear_payid_tokens(&user.id) {
            error!("Failed to clear PayID tokens for {}: {:#}", user.id, e);
        }
        return Err(ApiError::ProviderSessionExpired);
    };

    let access_token = state.cipher.encrypt(&tokens.access_token)?;
    let refresh_token = match &tokens.refresh_token {
        Some(token) => Some(state.cipher.encrypt(token)?),
        None => None,
    };
    let id_token = match &tokens.id_token {
        Some(token) => Some(state.cipher.encrypt(token)?),
        None => None,
    };
    state.db.update_payid_tokens(
        &user.id,
        &access_token,
        refresh_token.as_deref(),
        id_token.as_deref(),
    )?;
    info!("Refreshed PayID tokens for {}", user.id);

    Ok(Json(ApiResponse::message("Access token refreshed successfully")))
}
