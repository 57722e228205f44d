//! Crawler, health, and static asset endpoints.

use axum::extract::{Path, State};
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};

use crate::assets::content_type;
use crate::error::AppError;
use crate::state::AppState;

/// Body of `/robots.txt`: keep crawlers out of the demo shop.
pub const ROBOTS_TXT: &str = "User-agent: *\nDisallow: /";

pub async fn robots() -> &'static str {
    ROBOTS_TXT
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
pub async fn health() -> &'static str {
    "ok"
}

/// Serve `/static/{*path}` from the mounted asset collection.
pub async fn static_asset(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Response, AppError> {
    let key = path.trim_start_matches('/');
    if key.is_empty() || key.split('/').any(|segment| segment == "..") {
        return Err(AppError::NotFound(format!("/static/{path}")));
    }
    let bytes = state
        .assets()
        .get(key)
        .ok_or_else(|| AppError::NotFound(format!("/static/{key}")))?;
    Ok(([(CONTENT_TYPE, content_type(key))], bytes).into_response())
}

/// Fallback for unmatched paths.
pub async fn not_found(uri: axum::http::Uri) -> AppError {
    AppError::NotFound(uri.path().to_string())
}
