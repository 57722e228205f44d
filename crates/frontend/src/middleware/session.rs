//! Cookie-backed visitor sessions.
//!
//! Every request leaves this stage carrying a [`SessionId`] in its
//! extensions. First-time visitors get a freshly minted id and a
//! `shop_session-id` cookie; returning visitors keep theirs and no cookie is
//! re-issued.

use std::sync::Arc;

use axum::extract::{FromRequestParts, Request, State};
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use boutique_core::SessionId;
use cookie::{Cookie, SameSite};
use tracing::Span;

/// Cookie naming and lifetime settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieSettings {
    /// Prefix shared by every cookie the frontend owns.
    pub prefix: String,
    /// Lifetime of the session and currency cookies.
    pub max_age_seconds: i64,
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            prefix: "shop_".to_string(),
            max_age_seconds: 60 * 60 * 48,
        }
    }
}

impl CookieSettings {
    /// Name of the session cookie (`shop_session-id` by default).
    #[must_use]
    pub fn session_cookie_name(&self) -> String {
        format!("{}session-id", self.prefix)
    }

    /// Name of the currency preference cookie (`shop_currency` by default).
    #[must_use]
    pub fn currency_cookie_name(&self) -> String {
        format!("{}currency", self.prefix)
    }

    /// Whether `name` is one of ours.
    #[must_use]
    pub fn owns(&self, name: &str) -> bool {
        name.starts_with(&self.prefix)
    }

    /// A `Set-Cookie` value for `name=value` with the configured lifetime.
    #[must_use]
    pub fn persistent(&self, name: String, value: String) -> Cookie<'static> {
        Cookie::build((name, value))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .max_age(cookie::time::Duration::seconds(self.max_age_seconds))
            .build()
    }

    /// A `Set-Cookie` value that deletes `name` on the client.
    #[must_use]
    pub fn expired(name: String) -> Cookie<'static> {
        Cookie::build((name, ""))
            .path("/")
            .max_age(cookie::time::Duration::ZERO)
            .build()
    }
}

/// Iterate over every cookie sent with the request.
pub fn request_cookies(headers: &HeaderMap) -> impl Iterator<Item = Cookie<'static>> + '_ {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|raw| Cookie::split_parse(raw.to_owned()))
        .filter_map(Result::ok)
}

/// Value of the first cookie called `name`.
#[must_use]
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    request_cookies(headers)
        .find(|c| c.name() == name)
        .map(|c| c.value().to_owned())
}

/// Append a cookie to a response.
pub fn append_cookie(headers: &mut HeaderMap, cookie: &Cookie<'_>) {
    match HeaderValue::from_str(&cookie.to_string()) {
        Ok(value) => {
            headers.append(SET_COOKIE, value);
        }
        Err(e) => tracing::warn!(error = %e, cookie = cookie.name(), "Dropping unencodable cookie"),
    }
}

/// Middleware that guarantees a session id on every request.
pub async fn ensure_session(
    State(settings): State<Arc<CookieSettings>>,
    mut request: Request,
    next: Next,
) -> Response {
    let cookie_name = settings.session_cookie_name();
    let existing = read_cookie(request.headers(), &cookie_name)
        .and_then(|value| SessionId::from_cookie_value(&value));

    let (session_id, minted) = match existing {
        Some(id) => (id, false),
        None => (SessionId::generate(), true),
    };

    Span::current().record("session_id", session_id.as_str());
    sentry::configure_scope(|scope| {
        scope.set_tag("session_id", session_id.as_str());
    });

    request.extensions_mut().insert(session_id.clone());
    let mut response = next.run(request).await;

    if minted {
        let cookie = settings.persistent(cookie_name, session_id.as_str().to_owned());
        append_cookie(response.headers_mut(), &cookie);
    }
    response.extensions_mut().insert(session_id);
    response
}

/// Extractor for the session id assigned by [`ensure_session`].
///
/// Rejects with 500 if the session stage is missing from the pipeline.
#[derive(Debug, Clone)]
pub struct Session(pub SessionId);

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<SessionId>().cloned().map(Self).ok_or_else(|| {
            tracing::error!("Session id missing from request extensions - session stage not installed");
            (StatusCode::INTERNAL_SERVER_ERROR, "session unavailable")
        })
    }
}
