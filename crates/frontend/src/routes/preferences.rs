//! Visitor preference handlers: currency selection and logout.

use axum::Form;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::header::REFERER;
use axum::response::{IntoResponse, Redirect, Response};
use boutique_core::CurrencyCode;
use serde::Deserialize;
use tracing::instrument;
use url::Url;

use crate::error::{AppError, Result};
use crate::middleware::CookieSettings;
use crate::middleware::session::{append_cookie, request_cookies};
use crate::state::AppState;

/// Currency selection form data.
#[derive(Debug, Deserialize)]
pub struct SetCurrencyForm {
    #[serde(default)]
    pub currency_code: String,
}

/// Store the preferred currency and return to the previous page.
#[instrument(skip(state, headers))]
pub async fn set_currency(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<SetCurrencyForm>,
) -> Result<Response> {
    let code = CurrencyCode::parse(&form.currency_code)
        .map_err(|e| AppError::BadRequest(format!("invalid currency code: {e}")))?;

    let cookies = state.cookies();
    let cookie = cookies.persistent(cookies.currency_cookie_name(), code.to_string());

    let mut response = Redirect::to(&back_target(&headers)).into_response();
    append_cookie(response.headers_mut(), &cookie);
    Ok(response)
}

/// Forget the visitor: expire every cookie we own.
#[instrument(skip(state, headers))]
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let cookies = state.cookies();
    let mut response = Redirect::to("/").into_response();
    for cookie in request_cookies(&headers).filter(|c| cookies.owns(c.name())) {
        append_cookie(
            response.headers_mut(),
            &CookieSettings::expired(cookie.name().to_owned()),
        );
    }
    response
}

/// Path (and query) of the `Referer`, or `/`.
///
/// Only the path is kept so the redirect never leaves this site.
fn back_target(headers: &HeaderMap) -> String {
    let Some(referer) = headers.get(REFERER).and_then(|v| v.to_str().ok()) else {
        return "/".to_string();
    };

    let parsed = Url::parse(referer).or_else(|_| Url::parse("http://localhost/")?.join(referer));
    let Ok(url) = parsed else {
        return "/".to_string();
    };

    // A leading `//` would be read by browsers as another host.
    let path = format!("/{}", url.path().trim_start_matches(['/', '\\']));
    match url.query() {
        Some(query) => format!("{path}?{query}"),
        None => path,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn with_referer(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(REFERER, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_back_target_defaults_to_root() {
        assert_eq!(back_target(&HeaderMap::new()), "/");
    }

    #[test]
    fn test_back_target_keeps_path_and_query() {
        assert_eq!(
            back_target(&with_referer("http://shop.example/product/OLJCESPC7Z?x=1")),
            "/product/OLJCESPC7Z?x=1"
        );
        assert_eq!(back_target(&with_referer("/cart")), "/cart");
    }

    #[test]
    fn test_back_target_strips_foreign_host() {
        assert_eq!(back_target(&with_referer("https://evil.example/phish")), "/phish");
    }

    #[test]
    fn test_back_target_collapses_protocol_relative_path() {
        let target = back_target(&with_referer("http://shop.example//evil.example/phish"));
        assert_eq!(target, "/evil.example/phish");

        let target = back_target(&with_referer("http://shop.example///evil.example/x?y=1"));
        assert_eq!(target, "/evil.example/x?y=1");
        assert!(!target.starts_with("//"));
    }
}
