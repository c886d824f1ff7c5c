use axum::{
    Extension, Json,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, header::SET_COOKIE},
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;
use bucket_types::api::{
    ApiResponse, ReferralApplied, ReferralSubmitRequest, ReferredUser, SessionClaims,
};
use chrono::Duration;
use reqwest::Url;
use tracing::{debug, error, info, warn};

use crate::error::ApiError;
use crate::redirect;
use crate::session::cookie_header;
use crate::state::{AppState, AppStateInner, parse_user_id};

pub const REFERRAL_COOKIE: &str = "bucket-referral";
const REFERRAL_TTL_DAYS: i64 = 30;

/// Referrer id left by a `/r/{payTag}` visit, if any.
pub fn referral_cookie_value(headers: &HeaderMap) -> Option<String> {
    CookieJar::from_headers(headers)
        .get(REFERRAL_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
}

/// Bind the pending referral cookie to `user_id`.
///
/// A referral never blocks sign-in: store failures are logged and skipped.
/// Returns the header that clears the cookie when one was present.
pub(crate) fn consume_referral_cookie(
    state: &AppStateInner,
    headers: &HeaderMap,
    user_id: &str,
) -> Result<Option<HeaderValue>, ApiError> {
    let Some(referrer_id) = referral_cookie_value(headers) else {
        return Ok(None);
    };
    match state.db.set_referred_by(user_id, &referrer_id) {
        Ok(true) => info!("User {} referred by {}", user_id, referrer_id),
        Ok(false) => debug!("Referral cookie not applied to {}", user_id),
        Err(e) => warn!("Failed to apply referral cookie for {}: {:#}", user_id, e),
    }
    Ok(Some(cookie_header(&state.settings, REFERRAL_COOKIE, "", 0)?))
}

/// GET /r/{payTag}
pub async fn capture(State(state): State<AppState>, Path(pay_tag): Path<String>) -> Response {
    let referrer = match state.db.get_user_by_pay_tag(&pay_tag) {
        Ok(Some(user)) => user,
        Ok(None) => return redirect::to_app(&state.settings, "/register").into_response(),
        Err(e) => {
            error!("Referral lookup for {} failed: {:#}", pay_tag, e);
            return redirect::to_app(&state.settings, "/register").into_response();
        }
    };

    let cookie = match cookie_header(
        &state.settings,
        REFERRAL_COOKIE,
        &referrer.id,
        Duration::days(REFERRAL_TTL_DAYS).num_seconds(),
    ) {
        Ok(cookie) => cookie,
        Err(e) => {
            error!("Failed to build referral cookie: {:#}", e);
            return redirect::to_app(&state.settings, "/register").into_response();
        }
    };

    let destination = match Url::parse(&format!("{}/register", state.settings.app_url)) {
        Ok(mut url) => {
            url.query_pairs_mut().append_pair("ref", &pay_tag);
            url.to_string()
        }
        Err(_) => "/register".to_string(),
    };

    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, cookie);
    (headers, axum::response::Redirect::to(&destination)).into_response()
}

/// GET /api/v1/user/referrals
pub async fn list(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
) -> Result<Json<ApiResponse<Vec<ReferredUser>>>, ApiError> {
    let referred = state.db.list_referred_users(&claims.sub.to_string())?;
    let users = referred
        .into_iter()
        .map(|user| {
            Ok(ReferredUser {
                id: parse_user_id(&user.id)?,
                email: user.email,
                first_name: user.first_name,
                last_name: user.last_name,
                pay_tag: user.pay_tag,
                picture: user.picture,
                created_at: user.created_at,
            })
        })
        .collect::<Result<Vec<_>, ApiError>>()?;

    Ok(Json(ApiResponse::ok("Referrals retrieved", users)))
}

/// POST /api/v1/user/referrals
pub async fn submit(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
    Json(req): Json<ReferralSubmitRequest>,
) -> Result<Json<ApiResponse<ReferralApplied>>, ApiError> {
    let code = req.referral_code.trim();
    if code.is_empty() {
        return Err(ApiError::Validation("Referral code is required".into()));
    }

    let user = state.session_user(&claims)?;
    if user.referred_by.is_some() {
        return Err(ApiError::AlreadyReferred);
    }

    let referrer = state
        .db
        .get_user_by_pay_tag(code)?
        .ok_or_else(|| ApiError::NotFound("Referral code not found".into()))?;
    if referrer.id == user.id {
        return Err(ApiError::SelfReferral);
    }

    if !state.db.set_referred_by(&user.id, &referrer.id)? {
        return Err(ApiError::AlreadyReferred);
    }
    info!("User {} referred by {} (retroactive)", user.id, referrer.id);

    Ok(Json(ApiResponse::ok(
        "Referral applied",
        ReferralApplied {
            referred_by: referrer.pay_tag.unwrap_or_else(|| code.to_string()),
        },
    )))
}
