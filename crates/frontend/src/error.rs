//! Unified error handling with Sentry integration.
//!
//! Request handlers return `Result<T, AppError>`; server errors are captured
//! to Sentry before the error page is rendered. Construction and serving
//! failures are reported as [`ServerError`].

use std::net::SocketAddr;

use askama::Template;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use boutique_core::MoneyError;
use thiserror::Error;

use crate::assets::AssetError;
use crate::services::{ResolveError, ServiceError};

/// Application-level error type for request handlers.
#[derive(Debug, Error)]
pub enum AppError {
    /// Downstream service call failed.
    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    /// Amounts in different currencies were combined.
    #[error("Pricing error: {0}")]
    Money(#[from] MoneyError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Service(ServiceError::NotFound { .. }) | Self::NotFound(_) => {
                StatusCode::NOT_FOUND
            }
            Self::Service(ServiceError::InvalidArgument { .. }) | Self::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Service(ServiceError::Unavailable { .. }) => StatusCode::BAD_GATEWAY,
            Self::Money(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to visitors.
    fn public_message(&self) -> String {
        match self {
            Self::Service(ServiceError::NotFound { .. }) => "Not found".to_string(),
            Self::Service(ServiceError::InvalidArgument { message, .. }) => {
                format!("Invalid request: {message}")
            }
            Self::Service(ServiceError::Unavailable { .. }) => {
                "External service error".to_string()
            }
            Self::Money(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::NotFound(what) => format!("Not found: {what}"),
            Self::BadRequest(reason) => reason.clone(),
        }
    }
}

/// Error page.
#[derive(Template)]
#[template(path = "pages/error.html")]
struct ErrorTemplate {
    status_code: u16,
    status_text: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        // Don't expose internal error details to clients
        let page = ErrorTemplate {
            status_code: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.public_message(),
        };
        match page.render() {
            Ok(html) => (status, Html(html)).into_response(),
            Err(e) => {
                tracing::error!(error = %e, "Failed to render error page");
                (status, page.message).into_response()
            }
        }
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Failure to construct or run the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("dependency resolution failed: {0}")]
    Resolve(#[from] ResolveError),
    #[error("static assets unavailable: {0}")]
    Assets(#[from] AssetError),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::ServiceKind;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    async fn body(err: AppError) -> String {
        let bytes = axum::body::to_bytes(err.into_response().into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product OLJCESPC7Z".to_string());
        assert_eq!(err.to_string(), "Not found: product OLJCESPC7Z");

        let err = AppError::BadRequest("invalid quantity".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid quantity");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            get_status(
                ServiceError::NotFound {
                    service: ServiceKind::Catalog,
                    message: "no product".to_string(),
                }
                .into()
            ),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(
                ServiceError::Unavailable {
                    service: ServiceKind::Cart,
                    message: "connection refused".to_string(),
                }
                .into()
            ),
            StatusCode::BAD_GATEWAY
        );
    }

    #[tokio::test]
    async fn test_server_errors_hide_details() {
        let page = body(
            ServiceError::Unavailable {
                service: ServiceKind::Checkout,
                message: "dial tcp 10.0.0.7:5050: connection refused".to_string(),
            }
            .into(),
        )
        .await;
        assert!(page.contains("External service error"));
        assert!(!page.contains("10.0.0.7"));
    }

    #[tokio::test]
    async fn test_client_errors_show_reason() {
        let page = body(AppError::BadRequest("quantity must be between 1 and 10".to_string())).await;
        assert!(page.contains("quantity must be between 1 and 10"));
        assert!(page.contains("400"));
    }
}
