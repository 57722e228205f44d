//! Online Boutique frontend binary.
//!
//! Loads configuration, initializes Sentry and tracing, resolves the
//! downstream services, and serves the storefront until Ctrl+C or SIGTERM.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::process::ExitCode;

use boutique_frontend::config::FrontendConfig;
use boutique_frontend::platform::{DnsProbe, EnvironmentSettings};
use boutique_frontend::services::http::HttpServiceRegistry;
use boutique_frontend::{Server, ServerOptions};
use secrecy::ExposeSecret;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &FrontendConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry.dsn.as_ref()?;

    let guard = sentry::init((
        dsn.expose_secret(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry
                .environment
                .clone()
                .map(std::borrow::Cow::Owned),
            sample_rate: config.sentry.sample_rate,
            traces_sample_rate: config.sentry.traces_sample_rate,
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = match FrontendConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            // Tracing is not up yet; stderr is all we have.
            #[allow(clippy::print_stderr)]
            {
                eprintln!("failed to load configuration: {e}");
            }
            return ExitCode::FAILURE;
        }
    };

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    // Defaults to info level for our crate if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "boutique_frontend=info,tower_http=debug".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "frontend exited with error");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: FrontendConfig) -> Result<(), Box<dyn std::error::Error>> {
    let registry = HttpServiceRegistry::new(&config.services)?;
    let options = ServerOptions {
        env_platform: config.env_platform.clone(),
        environment: EnvironmentSettings {
            probe_timeout: config.probe_timeout,
            ..EnvironmentSettings::default()
        },
        sentry: config.sentry.dsn.is_some(),
        ..ServerOptions::default()
    };
    let server = Server::new(options, &registry, &DnsProbe, config.static_dir.clone()).await?;

    server
        .run_with_shutdown(config.socket_addr(), shutdown_signal())
        .await?;
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
