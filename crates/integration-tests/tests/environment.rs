//! Deployment environment detection as seen from a running frontend.

use std::sync::Arc;

use boutique_frontend::ServerOptions;
use boutique_integration_tests::{FakeBoutique, FakeRegistry, FixedProbe, TestApp, build_server};
use reqwest::StatusCode;

async fn label_for(env_platform: Option<&str>, probe: FixedProbe) -> String {
    let registry = FakeRegistry::new(Arc::new(FakeBoutique::new()));
    let options = ServerOptions {
        env_platform: env_platform.map(str::to_string),
        ..ServerOptions::default()
    };
    let server = build_server(options, &registry, &probe)
        .await
        .expect("Failed to construct server");
    server.environment().to_string()
}

#[tokio::test]
async fn test_unset_platform_outside_gcp_is_local() {
    assert_eq!(label_for(None, FixedProbe::unreachable()).await, "local");
}

#[tokio::test]
async fn test_recognized_platform_is_kept() {
    assert_eq!(label_for(Some("gcp"), FixedProbe::unreachable()).await, "gcp");
    assert_eq!(label_for(Some("local"), FixedProbe::unreachable()).await, "local");
}

#[tokio::test]
async fn test_platform_is_lowercased() {
    assert_eq!(label_for(Some("GCP"), FixedProbe::unreachable()).await, "gcp");
}

#[tokio::test]
async fn test_unrecognized_platform_falls_back_to_local() {
    assert_eq!(label_for(Some("aws"), FixedProbe::unreachable()).await, "local");
    assert_eq!(label_for(Some(""), FixedProbe::unreachable()).await, "local");
}

#[tokio::test]
async fn test_metadata_probe_overrides_explicit_platform() {
    assert_eq!(label_for(Some("local"), FixedProbe::reachable()).await, "gcp");
    assert_eq!(label_for(None, FixedProbe::reachable()).await, "gcp");
}

#[tokio::test]
async fn test_profile_is_rendered_in_footer() {
    let app = TestApp::start_with(None, FixedProbe::reachable()).await;

    let resp = app
        .client
        .get(app.url("/"))
        .send()
        .await
        .expect("Failed to get home page");
    assert_eq!(resp.status(), StatusCode::OK);

    let body = resp.text().await.expect("Failed to read response");
    assert!(body.contains("gcp-platform"), "missing platform class");
    assert!(body.contains("Google Cloud"), "missing provider name");
}

#[tokio::test]
async fn test_local_profile_is_rendered_in_footer() {
    let app = TestApp::start().await;

    let body = app
        .client
        .get(app.url("/"))
        .send()
        .await
        .expect("Failed to get home page")
        .text()
        .await
        .expect("Failed to read response");
    assert!(body.contains(r#"<p class="local">"#));
    assert!(!body.contains("Google Cloud"));
}
