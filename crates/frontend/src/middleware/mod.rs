//! HTTP middleware pipeline.
//!
//! # Stage Order (innermost first)
//!
//! 1. Router (404 on no match)
//! 2. Session assignment (mint `shop_session-id` when absent)
//! 3. Request logging (method, path, status, latency, session id)
//! 4. Tracing (`TraceLayer` span plus Sentry hubs when enabled)
//!
//! Session assignment must run inside logging and tracing so both observe
//! the session id. Each stage can be applied on its own with [`Stage::wrap`].

pub mod logging;
pub mod session;
pub mod trace;

use std::sync::Arc;

use axum::Router;

pub use logging::{AccessLogEntry, AccessLogSink, TracingAccessLog};
pub use session::{CookieSettings, Session};

/// A single request wrapper in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    SessionAssignment,
    RequestLogging,
    Tracing,
}

/// Pipeline stages, innermost first.
pub const PIPELINE: [Stage; 3] = [Stage::SessionAssignment, Stage::RequestLogging, Stage::Tracing];

/// Collaborators needed by the pipeline stages.
#[derive(Clone)]
pub struct PipelineOptions {
    pub cookies: Arc<CookieSettings>,
    pub access_log: Arc<dyn AccessLogSink>,
    /// Install per-request Sentry hubs in the tracing stage.
    pub sentry: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            cookies: Arc::new(CookieSettings::default()),
            access_log: Arc::new(TracingAccessLog),
            sentry: false,
        }
    }
}

impl Stage {
    /// Wrap `router` in this stage.
    #[must_use]
    pub fn wrap(self, router: Router, options: &PipelineOptions) -> Router {
        match self {
            Self::SessionAssignment => router.layer(axum::middleware::from_fn_with_state(
                Arc::clone(&options.cookies),
                session::ensure_session,
            )),
            Self::RequestLogging => router.layer(axum::middleware::from_fn_with_state(
                Arc::clone(&options.access_log),
                logging::log_requests,
            )),
            Self::Tracing => trace::wrap(router, options.sentry),
        }
    }
}

/// Wrap `router` in every stage of [`PIPELINE`].
#[must_use]
pub fn build_handler(router: Router, options: &PipelineOptions) -> Router {
    PIPELINE
        .into_iter()
        .fold(router, |router, stage| stage.wrap(router, options))
}
