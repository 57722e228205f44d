//! Server construction and lifecycle.
//!
//! [`Server::new`] performs every startup step in order and either yields a
//! fully wired server or an error; no partially built server is exposed.
//!
//! 1. Resolve the seven downstream services (fail fast).
//! 2. Detect the deployment environment and derive the platform profile.
//! 3. Look up the hostname (best effort).
//! 4. Mount static assets.
//! 5. Build the route table and wrap it in the middleware pipeline.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;

use crate::assets::AssetSource;
use crate::error::ServerError;
use crate::instrument::HttpMetrics;
use crate::middleware::{
    AccessLogSink, CookieSettings, PipelineOptions, TracingAccessLog, build_handler,
};
use crate::platform::{
    EnvironmentLabel, EnvironmentSettings, MetadataProbe, PlatformProfile, detect_environment,
};
use crate::routes::{build_routes, instrumented_labels};
use crate::services::{ServiceHandles, ServiceRegistry};
use crate::state::AppState;

/// Hostname reported when the lookup fails.
pub const UNKNOWN_HOSTNAME: &str = "unknown";

/// Tunables for [`Server::new`].
#[derive(Clone)]
pub struct ServerOptions {
    /// Raw `ENV_PLATFORM` value.
    pub env_platform: Option<String>,
    pub environment: EnvironmentSettings,
    pub cookies: CookieSettings,
    pub access_log: Arc<dyn AccessLogSink>,
    /// Bind a Sentry hub to each request. Set when a DSN is configured.
    pub sentry: bool,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            env_platform: None,
            environment: EnvironmentSettings::default(),
            cookies: CookieSettings::default(),
            access_log: Arc::new(TracingAccessLog),
            sentry: false,
        }
    }
}

impl std::fmt::Debug for ServerOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerOptions")
            .field("env_platform", &self.env_platform)
            .field("environment", &self.environment)
            .field("cookies", &self.cookies)
            .field("sentry", &self.sentry)
            .finish_non_exhaustive()
    }
}

/// A fully constructed frontend server.
pub struct Server {
    state: AppState,
    metrics: Arc<HttpMetrics>,
    handler: Router,
}

impl Server {
    /// Construct the server.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Resolve`] if any downstream service cannot be
    /// resolved and [`ServerError::Assets`] if the assets cannot be mounted.
    pub async fn new(
        options: ServerOptions,
        registry: &dyn ServiceRegistry,
        probe: &dyn MetadataProbe,
        assets: impl AssetSource,
    ) -> Result<Self, ServerError> {
        let services = ServiceHandles::resolve(registry)?;

        let environment = detect_environment(
            options.env_platform.as_deref(),
            probe,
            &options.environment,
        )
        .await;

        let hostname = current_hostname();
        let assets = assets.mount()?;

        let cookies = Arc::new(options.cookies);
        let state = AppState::new(
            services,
            environment,
            hostname,
            Arc::clone(&cookies),
            assets,
        );

        let metrics = Arc::new(HttpMetrics::new(instrumented_labels()));
        let routes = build_routes(state.clone(), &metrics);
        let handler = build_handler(
            routes,
            &PipelineOptions {
                cookies,
                access_log: options.access_log,
                sentry: options.sentry,
            },
        );

        tracing::info!(
            platform = %state.environment(),
            hostname = state.hostname(),
            "Frontend server constructed"
        );

        Ok(Self {
            state,
            metrics,
            handler,
        })
    }

    #[must_use]
    pub fn environment(&self) -> &EnvironmentLabel {
        self.state.environment()
    }

    #[must_use]
    pub fn platform(&self) -> PlatformProfile {
        self.state.platform()
    }

    #[must_use]
    pub fn hostname(&self) -> &str {
        self.state.hostname()
    }

    /// Per-route request counters.
    #[must_use]
    pub fn metrics(&self) -> &Arc<HttpMetrics> {
        &self.metrics
    }

    /// The fully wrapped request handler.
    #[must_use]
    pub fn router(&self) -> Router {
        self.handler.clone()
    }

    /// Bind `addr` and serve until the process exits.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] immediately if the address cannot be
    /// bound, and [`ServerError::Serve`] if serving fails.
    pub async fn run(self, addr: SocketAddr) -> Result<(), ServerError> {
        self.run_with_shutdown(addr, std::future::pending()).await
    }

    /// Like [`Server::run`], stopping gracefully when `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// See [`Server::run`].
    pub async fn run_with_shutdown(
        self,
        addr: SocketAddr,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        self.serve_with_shutdown(listener, shutdown).await
    }

    /// Serve on an already bound listener.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Serve`] if serving fails.
    pub async fn serve(self, listener: TcpListener) -> Result<(), ServerError> {
        self.serve_with_shutdown(listener, std::future::pending()).await
    }

    /// Serve on `listener` until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Serve`] if serving fails.
    pub async fn serve_with_shutdown(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServerError> {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!("frontend listening on {}", addr);
        }
        axum::serve(listener, self.handler)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(ServerError::Serve)
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// The machine's hostname, or [`UNKNOWN_HOSTNAME`].
fn current_hostname() -> String {
    match hostname::get() {
        Ok(name) => name.to_string_lossy().into_owned(),
        Err(e) => {
            tracing::debug!(error = %e, "Failed to read hostname");
            UNKNOWN_HOSTNAME.to_string()
        }
    }
}
