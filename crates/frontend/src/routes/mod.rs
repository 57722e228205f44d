//! HTTP route table.
//!
//! # Route Structure
//!
//! ```text
//! GET, HEAD  /                  - Home page                 (home)
//! GET, HEAD  /product/{id}      - Product detail            (product)
//! GET, HEAD  /cart              - Cart and checkout form    (cart_view)
//! POST       /cart              - Add to cart               (cart_add)
//! POST       /cart/empty        - Empty cart                (cart_empty)
//! POST       /setCurrency       - Change currency           (setcurrency)
//! GET        /logout            - Forget the visitor        (logout)
//! POST       /cart/checkout     - Place order               (cart_checkout)
//! GET        /static/{*path}    - Static assets             (static)
//! GET, HEAD  /robots.txt        - Crawler policy            (robots)
//! GET        /healthz           - Liveness probe            (not instrumented)
//! ```
//!
//! Every route except `/healthz` is wrapped in [`crate::instrument`] under
//! its label.

pub mod cart;
pub mod checkout;
pub mod home;
pub mod preferences;
pub mod probes;
pub mod product;
pub mod shop;

use std::sync::Arc;

use axum::Router;
use axum::routing::{MethodFilter, MethodRouter, on};

use crate::instrument::{HttpMetrics, Instrumented, instrument};
use crate::state::AppState;

/// HTTP methods used by the route table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    Head,
    Post,
}

impl Verb {
    const fn filter(self) -> MethodFilter {
        match self {
            Self::Get => MethodFilter::GET,
            Self::Head => MethodFilter::HEAD,
            Self::Post => MethodFilter::POST,
        }
    }
}

/// Handler behind a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Home,
    Product,
    CartView,
    CartAdd,
    CartEmpty,
    SetCurrency,
    Logout,
    Checkout,
    Static,
    Robots,
    Health,
}

/// One row of the route table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteEntry {
    pub methods: &'static [Verb],
    pub path: &'static str,
    /// Metrics label; `None` means the route is not instrumented.
    pub label: Option<&'static str>,
    pub endpoint: Endpoint,
}

impl RouteEntry {
    #[must_use]
    pub const fn instrumented(&self) -> bool {
        self.label.is_some()
    }
}

const GET_HEAD: &[Verb] = &[Verb::Get, Verb::Head];
const GET: &[Verb] = &[Verb::Get];
const POST: &[Verb] = &[Verb::Post];

const fn route(
    methods: &'static [Verb],
    path: &'static str,
    label: &'static str,
    endpoint: Endpoint,
) -> RouteEntry {
    RouteEntry {
        methods,
        path,
        label: Some(label),
        endpoint,
    }
}

/// The complete route table, in registration order.
pub const ROUTES: &[RouteEntry] = &[
    route(GET_HEAD, "/", "home", Endpoint::Home),
    route(GET_HEAD, "/product/{id}", "product", Endpoint::Product),
    route(GET_HEAD, "/cart", "cart_view", Endpoint::CartView),
    route(POST, "/cart", "cart_add", Endpoint::CartAdd),
    route(POST, "/cart/empty", "cart_empty", Endpoint::CartEmpty),
    route(POST, "/setCurrency", "setcurrency", Endpoint::SetCurrency),
    route(GET, "/logout", "logout", Endpoint::Logout),
    route(POST, "/cart/checkout", "cart_checkout", Endpoint::Checkout),
    route(GET, "/static/{*path}", "static", Endpoint::Static),
    route(GET_HEAD, "/robots.txt", "robots", Endpoint::Robots),
    RouteEntry {
        methods: GET,
        path: "/healthz",
        label: None,
        endpoint: Endpoint::Health,
    },
];

/// Labels of every instrumented route.
pub fn instrumented_labels() -> impl Iterator<Item = &'static str> {
    ROUTES.iter().filter_map(|entry| entry.label)
}

fn method_router(entry: &RouteEntry) -> MethodRouter<AppState> {
    let filter = entry
        .methods
        .iter()
        .map(|verb| verb.filter())
        .reduce(MethodFilter::or)
        .unwrap_or(MethodFilter::GET);

    match entry.endpoint {
        Endpoint::Home => on(filter, home::home),
        Endpoint::Product => on(filter, product::product),
        Endpoint::CartView => on(filter, cart::view_cart),
        Endpoint::CartAdd => on(filter, cart::add_to_cart),
        Endpoint::CartEmpty => on(filter, cart::empty_cart),
        Endpoint::SetCurrency => on(filter, preferences::set_currency),
        Endpoint::Logout => on(filter, preferences::logout),
        Endpoint::Checkout => on(filter, checkout::place_order),
        Endpoint::Static => on(filter, probes::static_asset),
        Endpoint::Robots => on(filter, probes::robots),
        Endpoint::Health => on(filter, probes::health),
    }
}

/// Build the router for [`ROUTES`], instrumenting labelled entries.
pub fn build_routes(state: AppState, metrics: &Arc<HttpMetrics>) -> Router {
    ROUTES
        .iter()
        .fold(Router::new(), |router, entry| {
            let handler = method_router(entry);
            let handler = match entry.label {
                Some(label) => handler.layer(axum::middleware::from_fn_with_state(
                    Instrumented {
                        label,
                        metrics: Arc::clone(metrics),
                    },
                    instrument,
                )),
                None => handler,
            };
            router.route(entry.path, handler)
        })
        .fallback(probes::not_found)
        .with_state(state)
}
