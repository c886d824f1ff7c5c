use axum::response::{IntoResponse, Redirect, Response};
use reqwest::Url;

use crate::state::Settings;

pub const DEFAULT_RETURN_PATH: &str = "/dashboard";

/// Only same-origin absolute paths survive; anything else lands on the dashboard.
pub fn safe_return_path(raw: Option<&str>) -> String {
    match raw.map(str::trim) {
        Some(path)
            if path.starts_with('/')
                && !path.starts_with("//")
                && !path.contains('\\')
                && !path.chars().any(char::is_control) =>
        {
            path.to_string()
        }
        _ => DEFAULT_RETURN_PATH.to_string(),
    }
}

/// Redirect to a path on the public origin.
pub fn to_app(settings: &Settings, path: &str) -> Redirect {
    Redirect::to(&format!("{}{}", settings.app_url, path))
}

/// Redirect to the error page with a human-readable reason.
pub fn to_error_page(settings: &Settings, message: &str) -> Response {
    let target = match Url::parse(&format!("{}/auth/error", settings.app_url)) {
        Ok(mut url) => {
            url.query_pairs_mut().append_pair("message", message);
            url.to_string()
        }
        Err(_) => "/auth/error".to_string(),
    };
    Redirect::to(&target).into_response()
}
