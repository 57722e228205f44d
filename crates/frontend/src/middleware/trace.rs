//! Request tracing: one span per request, plus Sentry request hubs when
//! error reporting is configured.

use axum::Router;
use axum::http::Request;
use tower_http::trace::{MakeSpan, TraceLayer};
use tracing::Span;

/// Builds the `http` span every request runs in.
///
/// `session_id` starts empty and is filled in by the session stage.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestSpan;

impl<B> MakeSpan<B> for RequestSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        tracing::info_span!(
            "http",
            method = %request.method(),
            path = %request.uri().path(),
            session_id = tracing::field::Empty,
        )
    }
}

/// Wrap `router` in the tracing stage.
///
/// With `sentry` set, Sentry layers sit outside the trace layer so each
/// request gets its own hub before the span opens.
pub fn wrap(router: Router, sentry: bool) -> Router {
    let router = router.layer(TraceLayer::new_for_http().make_span_with(RequestSpan));
    if !sentry {
        return router;
    }
    router
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
        .layer(sentry_tower::NewSentryLayer::new_from_top())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::Body;
    use axum::http::StatusCode;
    use axum::routing::get;
    use tower::ServiceExt;

    use super::*;

    #[tokio::test]
    async fn test_wrapped_router_still_serves() {
        for sentry in [false, true] {
            let app = wrap(Router::new().route("/", get(|| async { "hello" })), sentry);
            let response = app
                .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK, "sentry={sentry}");
        }
    }

    #[test]
    fn test_span_has_session_field() {
        let request = Request::builder().uri("/cart").body(()).unwrap();
        let span = RequestSpan.make_span(&request);
        // Without a subscriber the span is disabled, but the field set is static.
        if let Some(metadata) = span.metadata() {
            assert!(metadata.fields().field("session_id").is_some());
        }
    }
}
