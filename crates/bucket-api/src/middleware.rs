use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::error::ApiError;
use crate::session::extract_session_token;
use crate::state::AppState;

/// Validate the session credential and hand its claims to the handler.
pub async fn require_session(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let claims = extract_session_token(req.headers())
        .and_then(|token| state.sessions.validate(&token))
        .ok_or(ApiError::Unauthenticated)?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
