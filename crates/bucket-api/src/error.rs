use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bucket_types::api::ApiResponse;
use tracing::error;

use crate::payid::ProviderError;

/// Errors that cross the HTTP boundary.
///
/// Internal detail is logged when the response is built; callers only ever
/// see the curated `Display` text.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Invalid or expired code")]
    InvalidCode,

    #[error("Invalid or expired code")]
    InvalidOrExpired,

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("You have already been referred")]
    AlreadyReferred,

    #[error("You cannot refer yourself")]
    SelfReferral,

    #[error("Please connect your PayID account first")]
    NotConnected,

    #[error("PayID session expired, please reconnect your account")]
    ProviderSessionExpired,

    #[error("Too many requests")]
    RateLimited,

    #[error("Failed to send verification email")]
    DispatchFailed,

    #[error("Identity provider request failed")]
    Upstream(#[from] ProviderError),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_)
            | Self::InvalidCode
            | Self::InvalidOrExpired
            | Self::AlreadyReferred
            | Self::SelfReferral
            | Self::NotConnected => StatusCode::BAD_REQUEST,
            Self::Unauthenticated | Self::InvalidCredentials | Self::ProviderSessionExpired => {
                StatusCode::UNAUTHORIZED
            }
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::DispatchFailed | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            Self::Internal(e) => error!("Internal error: {:#}", e),
            Self::Upstream(e) => error!("Upstream error: {}", e),
            _ => {}
        }
        (self.status(), Json(ApiResponse::failure(self.to_string()))).into_response()
    }
}
