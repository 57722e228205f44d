//! Application state shared across handlers.

use std::sync::Arc;

use crate::assets::AssetProvider;
use crate::middleware::CookieSettings;
use crate::platform::{EnvironmentLabel, PlatformProfile};
use crate::services::ServiceHandles;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and is immutable once the
/// server has been constructed.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    services: ServiceHandles,
    environment: EnvironmentLabel,
    platform: PlatformProfile,
    hostname: String,
    cookies: Arc<CookieSettings>,
    assets: Arc<dyn AssetProvider>,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(
        services: ServiceHandles,
        environment: EnvironmentLabel,
        hostname: String,
        cookies: Arc<CookieSettings>,
        assets: Arc<dyn AssetProvider>,
    ) -> Self {
        let platform = PlatformProfile::for_label(&environment);
        Self {
            inner: Arc::new(AppStateInner {
                services,
                environment,
                platform,
                hostname,
                cookies,
                assets,
            }),
        }
    }

    /// Resolved downstream service handles.
    #[must_use]
    pub fn services(&self) -> &ServiceHandles {
        &self.inner.services
    }

    #[must_use]
    pub fn environment(&self) -> &EnvironmentLabel {
        &self.inner.environment
    }

    #[must_use]
    pub fn platform(&self) -> PlatformProfile {
        self.inner.platform
    }

    /// Host the server runs on, or `unknown`.
    #[must_use]
    pub fn hostname(&self) -> &str {
        &self.inner.hostname
    }

    #[must_use]
    pub fn cookies(&self) -> &CookieSettings {
        &self.inner.cookies
    }

    /// Mounted static assets.
    #[must_use]
    pub fn assets(&self) -> &dyn AssetProvider {
        self.inner.assets.as_ref()
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("environment", &self.inner.environment)
            .field("platform", &self.inner.platform)
            .field("hostname", &self.inner.hostname)
            .finish_non_exhaustive()
    }
}
