//! A shopper's path through the storefront: browse, cart, currency, checkout.

use boutique_frontend::services::ServiceKind;
use boutique_integration_tests::TestApp;
use reqwest::header::LOCATION;
use reqwest::{Client, Response, StatusCode};

async fn get(client: &Client, app: &TestApp, path: &str) -> Response {
    client
        .get(app.url(path))
        .send()
        .await
        .unwrap_or_else(|e| panic!("GET {path} failed: {e}"))
}

async fn post(client: &Client, app: &TestApp, path: &str, form: &[(&str, &str)]) -> Response {
    client
        .post(app.url(path))
        .form(form)
        .send()
        .await
        .unwrap_or_else(|e| panic!("POST {path} failed: {e}"))
}

fn location(resp: &Response) -> Option<&str> {
    resp.headers().get(LOCATION).and_then(|v| v.to_str().ok())
}

fn checkout_form() -> Vec<(&'static str, &'static str)> {
    vec![
        ("email", "someone@example.com"),
        ("street_address", "1600 Amphitheatre Parkway"),
        ("zip_code", "94043"),
        ("city", "Mountain View"),
        ("state", "CA"),
        ("country", "United States"),
        ("credit_card_number", "4432-8015-6152-0454"),
        ("credit_card_expiration_month", "1"),
        ("credit_card_expiration_year", "2039"),
        ("credit_card_cvv", "672"),
    ]
}

#[tokio::test]
async fn test_home_lists_products_with_prices() {
    let app = TestApp::start().await;
    let browser = app.browser();

    let resp = get(&browser, &app, "/").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.text().await.expect("Failed to read response");

    assert!(body.contains("Sunglasses"));
    assert!(body.contains("$19.99"));
    assert!(body.contains("Tank Top"));
    assert!(body.contains("$109.99"));
    assert!(body.contains(r#"<option value="USD" selected>"#));
    assert!(body.contains("Deals on boutique"), "ad missing");
}

#[tokio::test]
async fn test_product_page_shows_recommendations_and_ad() {
    let app = TestApp::start().await;
    let browser = app.browser();

    let resp = get(&browser, &app, "/product/66VCHSJNUP").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.text().await.expect("Failed to read response");

    assert!(body.contains("<h1>Tank Top</h1>"));
    assert!(body.contains("$18.99"));
    assert!(body.contains("You may also like"));
    assert!(body.contains("/product/OLJCESPC7Z"));
    assert!(body.contains("Deals on clothing"));
}

#[tokio::test]
async fn test_unknown_product_is_not_found() {
    let app = TestApp::start().await;

    let resp = get(&app.client, &app, "/product/NOPE").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body = resp.text().await.expect("Failed to read response");
    assert!(body.contains("404"));
}

#[tokio::test]
async fn test_add_view_and_empty_cart() {
    let app = TestApp::start().await;
    let browser = app.browser();

    let resp = post(
        &browser,
        &app,
        "/cart",
        &[("product_id", "OLJCESPC7Z"), ("quantity", "2")],
    )
    .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), Some("/cart"));

    let body = get(&browser, &app, "/cart")
        .await
        .text()
        .await
        .expect("Failed to read response");
    assert!(body.contains("Sunglasses"));
    // 2 x 19.99 + 8.99 shipping
    assert!(body.contains("$39.98"));
    assert!(body.contains("$48.97"));
    assert!(body.contains("Cart (2)"));

    let resp = post(&browser, &app, "/cart/empty", &[]).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), Some("/"));

    let body = get(&browser, &app, "/cart")
        .await
        .text()
        .await
        .expect("Failed to read response");
    assert!(body.contains("Your shopping cart is empty!"));
}

#[tokio::test]
async fn test_add_to_cart_validates_input() {
    let app = TestApp::start().await;

    for form in [
        [("product_id", "OLJCESPC7Z"), ("quantity", "0")],
        [("product_id", "OLJCESPC7Z"), ("quantity", "eleven")],
        [("product_id", ""), ("quantity", "1")],
    ] {
        let resp = post(&app.client, &app, "/cart", &form).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{form:?}");
    }

    let resp = post(
        &app.client,
        &app,
        "/cart",
        &[("product_id", "NOPE"), ("quantity", "1")],
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(app.boutique.calls(ServiceKind::Cart), 0);
}

#[tokio::test]
async fn test_currency_choice_changes_prices() {
    let app = TestApp::start().await;
    let browser = app.browser();

    let resp = post(&browser, &app, "/setCurrency", &[("currency_code", "EUR")]).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);

    let body = get(&browser, &app, "/")
        .await
        .text()
        .await
        .expect("Failed to read response");
    // 19.99 * 0.9 = 17.991
    assert!(body.contains("€17.99"), "prices not converted");
    assert!(body.contains(r#"<option value="EUR" selected>"#));
}

#[tokio::test]
async fn test_checkout_places_order_and_clears_cart() {
    let app = TestApp::start().await;
    let browser = app.browser();

    post(
        &browser,
        &app,
        "/cart",
        &[("product_id", "1YMWWN1N4O"), ("quantity", "1")],
    )
    .await;

    let resp = post(&browser, &app, "/cart/checkout", &checkout_form()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.text().await.expect("Failed to read response");

    assert!(body.contains("Your order is complete!"));
    assert!(body.contains(r#"<dd class="order-id">order-1</dd>"#));
    assert!(body.contains(r#"<dd class="tracking-id">track-1</dd>"#));
    // 109.99 + 8.99
    assert!(body.contains(r#"<dd class="total-paid">$118.98</dd>"#));
    assert!(body.contains("Cart</a>"), "cart badge should be gone");
}

#[tokio::test]
async fn test_checkout_rejects_invalid_forms() {
    let app = TestApp::start().await;

    let mut bad_email = checkout_form();
    bad_email[0] = ("email", "not-an-email");
    let mut bad_card = checkout_form();
    bad_card[6] = ("credit_card_number", "1234");
    let mut bad_month = checkout_form();
    bad_month[7] = ("credit_card_expiration_month", "13");

    for form in [bad_email, bad_card, bad_month] {
        let resp = post(&app.client, &app, "/cart/checkout", &form).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
    assert_eq!(app.boutique.calls(ServiceKind::Checkout), 0);
}

#[tokio::test]
async fn test_decorative_services_are_best_effort() {
    let app = TestApp::start().await;
    app.boutique.fail(ServiceKind::Ad);
    app.boutique.fail(ServiceKind::Recommendation);

    let resp = get(&app.client, &app, "/product/OLJCESPC7Z").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.text().await.expect("Failed to read response");
    assert!(!body.contains("You may also like"));
    assert!(!body.contains(r#"class="ad""#));
}

#[tokio::test]
async fn test_required_service_outage_renders_error_page() {
    let app = TestApp::start().await;
    app.boutique.fail(ServiceKind::Currency);

    let resp = get(&app.client, &app, "/").await;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    let body = resp.text().await.expect("Failed to read response");
    assert!(body.contains("Uh, oh!"));
    assert!(body.contains("502"));
}
