//! Per-request access logging.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{Request, State};
use axum::http::{Method, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use boutique_core::SessionId;

/// One completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessLogEntry {
    pub method: Method,
    pub path: String,
    pub status: StatusCode,
    pub latency: Duration,
    /// Absent only if the session stage did not run.
    pub session_id: Option<SessionId>,
}

/// Destination for access log entries. Must not fail or block.
pub trait AccessLogSink: Send + Sync {
    fn record(&self, entry: &AccessLogEntry);
}

/// Writes access log entries as `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAccessLog;

impl AccessLogSink for TracingAccessLog {
    fn record(&self, entry: &AccessLogEntry) {
        let session_id = entry.session_id.as_ref().map(SessionId::as_str);
        #[allow(clippy::cast_possible_truncation)] // latency will never exceed u64 millis
        let latency_ms = entry.latency.as_millis() as u64;
        if entry.status.is_server_error() {
            tracing::warn!(
                method = %entry.method,
                path = %entry.path,
                status = entry.status.as_u16(),
                latency_ms,
                session_id,
                "request served"
            );
        } else {
            tracing::info!(
                method = %entry.method,
                path = %entry.path,
                status = entry.status.as_u16(),
                latency_ms,
                session_id,
                "request served"
            );
        }
    }
}

/// Middleware that reports every request to the access log sink.
///
/// Runs outside the session stage and picks the session id up from the
/// response extensions.
pub async fn log_requests(
    State(sink): State<Arc<dyn AccessLogSink>>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let started = Instant::now();

    let response = next.run(request).await;

    sink.record(&AccessLogEntry {
        method,
        path,
        status: response.status(),
        latency: started.elapsed(),
        session_id: response.extensions().get::<SessionId>().cloned(),
    });
    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use axum::Router;
    use axum::body::Body;
    use axum::routing::get;
    use tower::ServiceExt;

    use super::*;

    /// Sink that keeps every entry in memory.
    #[derive(Default)]
    pub(crate) struct MemorySink(pub(crate) Mutex<Vec<AccessLogEntry>>);

    impl AccessLogSink for MemorySink {
        fn record(&self, entry: &AccessLogEntry) {
            self.0.lock().unwrap().push(entry.clone());
        }
    }

    #[tokio::test]
    async fn test_records_method_path_and_status() {
        let sink = Arc::new(MemorySink::default());
        let app = Router::new()
            .route("/cart", get(|| async { "cart" }))
            .fallback(|| async { StatusCode::NOT_FOUND })
            .layer(axum::middleware::from_fn_with_state(
                Arc::clone(&sink) as Arc<dyn AccessLogSink>,
                log_requests,
            ));

        for uri in ["/cart", "/nowhere"] {
            app.clone()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
        }

        let entries = sink.0.lock().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].method, Method::GET);
        assert_eq!(entries[0].path, "/cart");
        assert_eq!(entries[0].status, StatusCode::OK);
        assert_eq!(entries[1].status, StatusCode::NOT_FOUND);
        // No session stage installed here.
        assert!(entries[0].session_id.is_none());
    }

    #[test]
    fn test_tracing_sink_accepts_any_entry() {
        TracingAccessLog.record(&AccessLogEntry {
            method: Method::POST,
            path: "/cart/checkout".to_string(),
            status: StatusCode::BAD_GATEWAY,
            latency: Duration::from_millis(12),
            session_id: None,
        });
    }
}
