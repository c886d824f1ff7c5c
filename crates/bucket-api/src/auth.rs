use axum::{
    Extension, Json,
    extract::State,
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::{IntoResponse, Response},
};
use bucket_db::models::{NewUser, UserRow};
use bucket_types::api::{
    ApiResponse, LoginRequest, RedirectData, RegisterRequest, SessionClaims, UserProfile,
};
use tracing::info;
use uuid::Uuid;

use crate::error::ApiError;
use crate::redirect::DEFAULT_RETURN_PATH;
use crate::referrals::consume_referral_cookie;
use crate::session::{clear_session_cookie, session_cookie};
use crate::state::{AppState, AppStateInner, parse_user_id};

const MIN_PASSWORD_LEN: usize = 8;

/// Lowercased, trimmed email; rejects blanks and obviously malformed input.
pub(crate) fn normalize_email(raw: &str) -> Result<String, ApiError> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() {
        return Err(ApiError::Validation("Email is required".into()));
    }
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(ApiError::Validation("Invalid email address".into())),
    }
}

/// Bind any pending referral, then set the session cookie for `user`.
pub(crate) fn start_session(
    state: &AppStateInner,
    request_headers: &HeaderMap,
    user: &UserRow,
) -> Result<HeaderMap, ApiError> {
    let mut headers = HeaderMap::new();
    if let Some(clear) = consume_referral_cookie(state, request_headers, &user.id)? {
        headers.append(SET_COOKIE, clear);
    }
    let token = state.issue_session(user)?;
    headers.append(SET_COOKIE, session_cookie(&state.settings, &token)?);
    Ok(headers)
}

/// POST /api/v1/auth/register
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RegisterRequest>,
) -> Result<Response, ApiError> {
    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::Validation("Email and password are required".into()));
    }
    let email = normalize_email(&req.email)?;
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    if state.db.get_user_by_email(&email)?.is_some() {
        return Err(ApiError::Conflict("User with this email already exists".into()));
    }

    let referred_by = match req.referral_code.as_deref().map(str::trim) {
        Some(code) if !code.is_empty() => Some(
            state
                .db
                .get_user_by_pay_tag(code)?
                .ok_or_else(|| ApiError::NotFound("Referral code not found".into()))?
                .id,
        ),
        _ => None,
    };

    let password_hash = state.hash_secret(req.password).await?;
    let user_id = Uuid::new_v4().to_string();
    let created = state.db.create_user(
        &user_id,
        &NewUser {
            email: email.clone(),
            password: Some(password_hash),
            first_name: req.first_name,
            last_name: req.last_name,
            phone: req.phone,
            email_verified: false,
            referred_by,
        },
    )?;
    if !created {
        return Err(ApiError::Conflict("User with this email already exists".into()));
    }
    info!("Registered user {} ({})", user_id, email);

    // An explicit referral code wins; the cookie only fills an empty slot.
    let mut response_headers = HeaderMap::new();
    if let Some(clear) = consume_referral_cookie(&state, &headers, &user_id)? {
        response_headers.append(SET_COOKIE, clear);
    }

    Ok((
        StatusCode::CREATED,
        response_headers,
        Json(ApiResponse::message(
            "Registration successful. Please verify your email.",
        )),
    )
        .into_response())
}

/// POST /api/v1/auth/login
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::Validation("Email and password are required".into()));
    }

    let email = req.email.trim().to_lowercase();
    let user = state
        .db
        .get_user_by_email(&email)?
        .ok_or(ApiError::InvalidCredentials)?;
    let stored = user.password.clone().ok_or(ApiError::InvalidCredentials)?;

    if !state.verify_secret(req.password, stored).await? {
        return Err(ApiError::InvalidCredentials);
    }

    let response_headers = start_session(&state, &headers, &user)?;
    info!("User {} logged in", user.id);

    Ok((
        response_headers,
        Json(ApiResponse::ok(
            "Login successful",
            RedirectData {
                redirect_url: DEFAULT_RETURN_PATH.to_string(),
            },
        )),
    )
        .into_response())
}

/// GET /api/v1/auth/session
pub async fn session(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
) -> Result<Json<ApiResponse<UserProfile>>, ApiError> {
    let user = state.session_user(&claims)?;
    let kyc_verified = user.payid.as_ref().is_some_and(|link| link.kyc_verified);

    Ok(Json(ApiResponse::ok(
        "Session retrieved",
        UserProfile {
            id: parse_user_id(&user.id)?,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            picture: user.picture,
            pay_tag: user.pay_tag,
            email_verified: user.email_verified,
            phone_verified: user.phone_verified,
            kyc_verified,
        },
    )))
}

/// POST /api/v1/auth/logout
pub async fn logout(State(state): State<AppState>) -> Result<Response, ApiError> {
    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, clear_session_cookie(&state.settings)?);
    Ok((headers, Json(ApiResponse::message("Logged out"))).into_response())
}
