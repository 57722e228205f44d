//! Frontend configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Downstream services
//! - `PRODUCT_CATALOG_SERVICE_ADDR`, `CURRENCY_SERVICE_ADDR`, `CART_SERVICE_ADDR`,
//!   `RECOMMENDATION_SERVICE_ADDR`, `CHECKOUT_SERVICE_ADDR`,
//!   `SHIPPING_SERVICE_ADDR`, `AD_SERVICE_ADDR` - base address of each service
//!   (`host:port` or a full URL). A missing address is reported when the
//!   server resolves its dependencies, not here.
//!
//! ## Optional
//! - `FRONTEND_HOST` - Bind address (default: 127.0.0.1)
//! - `FRONTEND_PORT` - Listen port (default: 8080)
//! - `ENV_PLATFORM` - Deployment platform label (`local` or `gcp`)
//! - `FRONTEND_STATIC_DIR` - Static asset directory (default: crates/frontend/static)
//! - `FRONTEND_PROBE_TIMEOUT_MS` - Metadata DNS probe timeout (default: 2000)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error event sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate (default: 0.0)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

use crate::platform::ENV_PLATFORM_VAR;
use crate::services::ServiceKind;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Base addresses of the downstream services, keyed by service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceAddresses(HashMap<ServiceKind, String>);

impl ServiceAddresses {
    /// Builder-style setter, mostly for tests.
    #[must_use]
    pub fn with(mut self, service: ServiceKind, address: impl Into<String>) -> Self {
        self.0.insert(service, address.into());
        self
    }

    /// Address configured for `service`, if any.
    #[must_use]
    pub fn get(&self, service: ServiceKind) -> Option<&str> {
        self.0.get(&service).map(String::as_str)
    }

    fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Self {
        Self(
            ServiceKind::ALL
                .into_iter()
                .filter_map(|kind| lookup(kind.address_env_var()).map(|addr| (kind, addr)))
                .collect(),
        )
    }
}

/// Sentry error tracking configuration.
///
/// Implements `Debug` manually to redact the DSN.
#[derive(Clone)]
pub struct SentryConfig {
    pub dsn: Option<SecretString>,
    pub environment: Option<String>,
    pub sample_rate: f32,
    pub traces_sample_rate: f32,
}

impl Default for SentryConfig {
    fn default() -> Self {
        Self {
            dsn: None,
            environment: None,
            sample_rate: 1.0,
            traces_sample_rate: 0.0,
        }
    }
}

impl std::fmt::Debug for SentryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SentryConfig")
            .field("dsn", &self.dsn.as_ref().map(|_| "[REDACTED]"))
            .field("environment", &self.environment)
            .field("sample_rate", &self.sample_rate)
            .field("traces_sample_rate", &self.traces_sample_rate)
            .finish()
    }
}

/// Frontend application configuration.
#[derive(Debug, Clone)]
pub struct FrontendConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Raw `ENV_PLATFORM` value, validated by environment detection
    pub env_platform: Option<String>,
    /// Directory served under `/static/`
    pub static_dir: PathBuf,
    /// Upper bound on the metadata DNS probe
    pub probe_timeout: Duration,
    /// Downstream service addresses
    pub services: ServiceAddresses,
    /// Sentry configuration
    pub sentry: SentryConfig,
}

impl FrontendConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but cannot be parsed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host = parse_or_default(&lookup, "FRONTEND_HOST", IpAddr::from([127, 0, 0, 1]))?;
        let port = parse_or_default(&lookup, "FRONTEND_PORT", 8080_u16)?;
        let probe_timeout_ms = parse_or_default(&lookup, "FRONTEND_PROBE_TIMEOUT_MS", 2000_u64)?;
        let static_dir = non_empty(&lookup, "FRONTEND_STATIC_DIR")
            .map_or_else(|| PathBuf::from("crates/frontend/static"), PathBuf::from);

        let sentry = SentryConfig {
            dsn: non_empty(&lookup, "SENTRY_DSN").map(SecretString::from),
            environment: non_empty(&lookup, "SENTRY_ENVIRONMENT"),
            sample_rate: parse_rate(&lookup, "SENTRY_SAMPLE_RATE", 1.0)?,
            traces_sample_rate: parse_rate(&lookup, "SENTRY_TRACES_SAMPLE_RATE", 0.0)?,
        };

        Ok(Self {
            host,
            port,
            env_platform: lookup(ENV_PLATFORM_VAR),
            static_dir,
            probe_timeout: Duration::from_millis(probe_timeout_ms),
            services: ServiceAddresses::from_lookup(&lookup),
            sentry,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a variable, treating blank values as unset.
fn non_empty(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key).filter(|v| !v.trim().is_empty())
}

/// Parse a variable, falling back to `default` when unset.
fn parse_or_default<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    non_empty(lookup, key).map_or(Ok(default), |value| {
        value
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}

/// Parse a sample rate in `0.0..=1.0`.
fn parse_rate(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: f32,
) -> Result<f32, ConfigError> {
    let rate = parse_or_default(lookup, key, default)?;
    if (0.0..=1.0).contains(&rate) {
        Ok(rate)
    } else {
        Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("must be between 0.0 and 1.0 (got {rate})"),
        ))
    }
}
