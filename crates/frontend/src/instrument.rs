//! Per-route request metrics.
//!
//! Counters are plain atomics keyed by route label. The set of labels is
//! fixed when the route table is built, so recording never allocates or
//! locks.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

#[derive(Debug, Default)]
struct LabelMetrics {
    requests: AtomicU64,
    errors: AtomicU64,
    latency_micros: AtomicU64,
}

/// Point-in-time view of one label's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub requests: u64,
    /// Responses with a 5xx status.
    pub errors: u64,
    pub total_latency: Duration,
}

/// Request counters for every instrumented route.
#[derive(Debug)]
pub struct HttpMetrics {
    labels: HashMap<&'static str, LabelMetrics>,
}

impl HttpMetrics {
    /// Create zeroed counters for `labels`.
    pub fn new(labels: impl IntoIterator<Item = &'static str>) -> Self {
        Self {
            labels: labels
                .into_iter()
                .map(|label| (label, LabelMetrics::default()))
                .collect(),
        }
    }

    /// Record one completed request. Unknown labels are ignored.
    pub fn record(&self, label: &str, status: u16, latency: Duration) {
        let Some(metrics) = self.labels.get(label) else {
            tracing::debug!(label, "Dropping metrics for unregistered label");
            return;
        };
        metrics.requests.fetch_add(1, Ordering::Relaxed);
        if status >= 500 {
            metrics.errors.fetch_add(1, Ordering::Relaxed);
        }
        let micros = u64::try_from(latency.as_micros()).unwrap_or(u64::MAX);
        metrics.latency_micros.fetch_add(micros, Ordering::Relaxed);
    }

    /// Counters for `label`, or `None` if it is not instrumented.
    #[must_use]
    pub fn snapshot(&self, label: &str) -> Option<MetricsSnapshot> {
        self.labels.get(label).map(|m| MetricsSnapshot {
            requests: m.requests.load(Ordering::Relaxed),
            errors: m.errors.load(Ordering::Relaxed),
            total_latency: Duration::from_micros(m.latency_micros.load(Ordering::Relaxed)),
        })
    }

    /// Requests recorded across all labels.
    #[must_use]
    pub fn total_requests(&self) -> u64 {
        self.labels
            .values()
            .map(|m| m.requests.load(Ordering::Relaxed))
            .sum()
    }

    /// Instrumented labels, sorted.
    #[must_use]
    pub fn labels(&self) -> Vec<&'static str> {
        let mut labels: Vec<_> = self.labels.keys().copied().collect();
        labels.sort_unstable();
        labels
    }
}

/// State for [`instrument`]: the route label and the shared counters.
#[derive(Debug, Clone)]
pub struct Instrumented {
    pub label: &'static str,
    pub metrics: Arc<HttpMetrics>,
}

/// Route-level middleware that records the request under its label.
pub async fn instrument(
    State(route): State<Instrumented>,
    request: Request,
    next: Next,
) -> Response {
    let started = Instant::now();
    let response = next.run(request).await;
    route
        .metrics
        .record(route.label, response.status().as_u16(), started.elapsed());
    response
}
