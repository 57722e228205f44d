//! Deployment environment detection and the platform profile derived from it.
//!
//! Detection runs once during server construction:
//!
//! 1. `ENV_PLATFORM` is honoured only if it names a recognized environment;
//!    anything else (including unset) falls back to `local`.
//! 2. A DNS lookup of the GCP metadata host is attempted. If it resolves, the
//!    label becomes `gcp` regardless of step 1, so a redeployed binary picks up
//!    its platform without reconfiguration. A failed lookup keeps step 1's label.
//! 3. The final label is lowercased.

use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Environment variable holding the explicit platform label.
pub const ENV_PLATFORM_VAR: &str = "ENV_PLATFORM";

/// Host whose resolvability signals a GCP deployment.
pub const GCP_METADATA_HOST: &str = "metadata.google.internal.";

const LOCAL: &str = "local";
const GCP: &str = "gcp";

/// Tunables for [`detect_environment`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentSettings {
    /// Labels accepted from explicit configuration.
    pub recognized: Vec<String>,
    /// Label used when the explicit value is empty or unrecognized.
    pub default_label: String,
    /// Host looked up by the metadata probe.
    pub metadata_host: String,
    /// Label forced when the metadata probe succeeds.
    pub probe_label: String,
    /// Upper bound on the probe's lookup time.
    pub probe_timeout: Duration,
}

impl Default for EnvironmentSettings {
    fn default() -> Self {
        Self {
            recognized: vec![LOCAL.to_string(), GCP.to_string()],
            default_label: LOCAL.to_string(),
            metadata_host: GCP_METADATA_HOST.to_string(),
            probe_label: GCP.to_string(),
            probe_timeout: Duration::from_secs(2),
        }
    }
}

impl EnvironmentSettings {
    fn recognizes(&self, value: &str) -> bool {
        self.recognized
            .iter()
            .any(|known| known.eq_ignore_ascii_case(value))
    }
}

/// Normalized (lowercase) deployment environment label.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnvironmentLabel(String);

impl EnvironmentLabel {
    /// Normalize a raw label.
    #[must_use]
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().to_lowercase())
    }

    /// Returns the label as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EnvironmentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors from the metadata probe. Never surfaced past detection.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("metadata lookup failed: {0}")]
    Lookup(#[from] std::io::Error),
    #[error("metadata lookup timed out after {0:?}")]
    Timeout(Duration),
}

/// Runtime check for a managed-cloud metadata server.
#[async_trait]
pub trait MetadataProbe: Send + Sync {
    /// Resolve `host`. Success means the host is known to the resolver, even
    /// if it yields no addresses.
    async fn lookup(&self, host: &str) -> Result<Vec<IpAddr>, ProbeError>;
}

/// [`MetadataProbe`] backed by the system resolver.
///
/// Unbounded on its own; [`detect_environment`] applies
/// [`EnvironmentSettings::probe_timeout`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DnsProbe;

#[async_trait]
impl MetadataProbe for DnsProbe {
    async fn lookup(&self, host: &str) -> Result<Vec<IpAddr>, ProbeError> {
        let addrs = tokio::net::lookup_host((host, 0)).await?;
        Ok(addrs.map(|addr| addr.ip()).collect())
    }
}

/// Resolve the environment label from explicit configuration and the probe.
///
/// Always produces a usable label; probe errors are logged and swallowed.
pub async fn detect_environment(
    explicit: Option<&str>,
    probe: &dyn MetadataProbe,
    settings: &EnvironmentSettings,
) -> EnvironmentLabel {
    let mut label = match explicit.map(str::trim) {
        Some(value) if !value.is_empty() && settings.recognizes(value) => value.to_string(),
        other => {
            tracing::info!(
                value = other.unwrap_or_default(),
                default = %settings.default_label,
                "env platform is either empty or invalid"
            );
            settings.default_label.clone()
        }
    };

    let outcome = tokio::time::timeout(
        settings.probe_timeout,
        probe.lookup(&settings.metadata_host),
    )
    .await
    .unwrap_or(Err(ProbeError::Timeout(settings.probe_timeout)));

    match outcome {
        Ok(addresses) => {
            tracing::debug!(
                ?addresses,
                host = %settings.metadata_host,
                "Detected metadata server, overriding env platform"
            );
            label.clone_from(&settings.probe_label);
        }
        Err(e) => {
            tracing::debug!(error = %e, "Metadata probe failed, keeping configured env platform");
        }
    }

    let label = EnvironmentLabel::new(&label);
    tracing::debug!(platform = %label, "ENV_PLATFORM resolved");
    label
}

/// Display parameters derived from the environment label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlatformProfile {
    /// CSS class applied to the page banner.
    pub display_class: &'static str,
    /// Human-readable hosting provider name.
    pub provider_name: &'static str,
}

impl PlatformProfile {
    /// Map a label to its profile. `gcp` is the only non-local profile.
    #[must_use]
    pub fn for_label(label: &EnvironmentLabel) -> Self {
        if label.as_str() == GCP {
            Self {
                display_class: "gcp-platform",
                provider_name: "Google Cloud",
            }
        } else {
            Self {
                display_class: "local",
                provider_name: "local",
            }
        }
    }
}
