use axum::{
    Json, Router, middleware,
    routing::{get, post},
};
use bucket_types::api::ApiResponse;

use crate::middleware::require_session;
use crate::state::AppState;
use crate::{account, auth, kyc, oauth, referrals, report, verification};

/// Full HTTP surface. Transport layers (CORS, tracing) are added by the binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/api/v1/auth/register", post(auth::register))
        .route("/api/v1/auth/login", post(auth::login))
        .route("/api/v1/auth/logout", post(auth::logout))
        .route("/api/v1/auth/otp/request", post(verification::request_otp))
        .route("/api/v1/auth/otp/verify", post(verification::verify_otp))
        .route(
            "/api/v1/auth/magic-link/request",
            post(verification::request_magic_link),
        )
        .route(
            "/api/v1/auth/magic-link/verify",
            get(verification::verify_magic_link),
        )
        .route("/api/v1/payid/oauth/initiate", post(oauth::initiate))
        .route(
            "/api/v1/payid/oauth/login/magic-link/request",
            post(oauth::request_provider_magic_link),
        )
        .route("/callback/payid", get(oauth::callback))
        .route("/r/{pay_tag}", get(referrals::capture))
        .route("/api/v1/system/report-error", post(report::report_error));

    let protected_routes = Router::new()
        .route("/api/v1/auth/session", get(auth::session))
        .route(
            "/api/v1/user/referrals",
            get(referrals::list).post(referrals::submit),
        )
        .route("/api/v1/payid/userinfo", get(account::user_info))
        .route(
            "/api/v1/payid/oauth/token/refresh",
            post(account::refresh_tokens),
        )
        .route("/api/v1/payid/kyc/verify", post(kyc::verify))
        .route("/api/v1/payid/kyc/status", get(kyc::status))
        .route(
            "/api/v1/payid/kyc/status/{session_id}",
            get(kyc::status_for_session),
        )
        .route("/api/v1/payid/kyc/retry/{session_id}", post(kyc::retry))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_session,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

async fn health() -> Json<ApiResponse<()>> {
    Json(ApiResponse::message("ok"))
}
