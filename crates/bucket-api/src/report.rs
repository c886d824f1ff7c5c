use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use bucket_types::api::{ApiResponse, ErrorReport};
use tracing::{error, info, warn};

use crate::email::crash_report_email;
use crate::error::ApiError;
use crate::state::{AppState, AppStateInner};

/// First hop of `x-forwarded-for`, or `unknown`.
pub fn client_key(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("unknown")
        .to_string()
}

/// POST /api/v1/system/report-error
///
/// Never fails loudly: internal trouble is logged and answered with a
/// generic 500.
pub async fn report_error(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let client = client_key(&headers);
    if !state.report_limiter.check(&client) {
        warn!("Error report from {} rate limited", client);
        return ApiError::RateLimited.into_response();
    }

    let report: ErrorReport = match serde_json::from_slice(&body) {
        Ok(report) => report,
        Err(e) => {
            warn!("Unreadable error report from {}: {}", client, e);
            return ApiError::Validation("Invalid error report".into()).into_response();
        }
    };
    let present = |field: &Option<String>| field.as_deref().is_some_and(|v| !v.trim().is_empty());
    if !present(&report.message) && !present(&report.digest) {
        return ApiError::Validation("Empty error report".into()).into_response();
    }

    match notify_admins(&state, &report).await {
        Ok(0) => {
            warn!("Error report received but no admin users to notify");
            Json(ApiResponse::message("Error reported internally.")).into_response()
        }
        Ok(notified) => {
            info!("Error report forwarded to {} admin(s)", notified);
            Json(ApiResponse::message("Error reported and admins notified.")).into_response()
        }
        Err(e) => {
            error!("Failed to process error report: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::failure("Failed to process error report")),
            )
                .into_response()
        }
    }
}

/// Mail every admin. Returns how many messages went out.
async fn notify_admins(state: &AppStateInner, report: &ErrorReport) -> anyhow::Result<usize> {
    let admins = state.db.list_admins()?;
    let mut sent = 0;
    for admin in &admins {
        match state.email.send(crash_report_email(&admin.email, report)).await {
            Ok(()) => sent += 1,
            Err(e) => warn!("Failed to mail error report to {}: {:#}", admin.email, e),
        }
    }
    if !admins.is_empty() && sent == 0 {
        anyhow::bail!("No admin could be notified");
    }
    Ok(sent)
}
