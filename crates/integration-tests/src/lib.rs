//! End-to-end tests for the Online Boutique frontend.
//!
//! The frontend is started on an ephemeral port against [`FakeBoutique`], an
//! in-memory stand-in for all seven downstream services, so the suite needs
//! no network access beyond loopback.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p boutique-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `environment` - platform detection and the rendered profile
//! - `session` - visitor cookies and access logging
//! - `routes` - probes, static assets, instrumentation
//! - `wiring` - fail-fast service resolution
//! - `storefront_flow` - browse, cart, currency, checkout

#![allow(clippy::missing_panics_doc)]

use std::collections::{HashMap, HashSet};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use boutique_core::{
    Ad, Address, CartItem, CurrencyCode, Money, OrderId, OrderItem, OrderResult,
    PlaceOrderRequest, Product, ProductId, SessionId, TrackingId,
};
use boutique_frontend::assets::StaticAssets;
use boutique_frontend::instrument::HttpMetrics;
use boutique_frontend::middleware::{AccessLogEntry, AccessLogSink};
use boutique_frontend::platform::{MetadataProbe, ProbeError};
use boutique_frontend::services::{
    AdService, CartService, CatalogService, CheckoutService, CurrencyService,
    RecommendationService, ResolveError, ServiceError, ServiceKind, ServiceRegistry,
    ServiceResult, ShippingService,
};
use boutique_frontend::{Server, ServerError, ServerOptions};
use rust_decimal::Decimal;

/// Stylesheet served by every test server.
pub const TEST_STYLESHEET: &str = "body { margin: 0; }";

/// Flat shipping cost in USD.
pub const SHIPPING_USD: Decimal = Decimal::from_parts(899, 0, 0, false, 2);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn usd(amount: Decimal) -> Money {
    Money::new(amount, CurrencyCode::usd())
}

/// Catalog used by [`FakeBoutique::new`].
#[must_use]
pub fn sample_products() -> Vec<Product> {
    vec![
        Product {
            id: ProductId::new("OLJCESPC7Z"),
            name: "Sunglasses".to_string(),
            description: "Add a modern touch to your outfits.".to_string(),
            picture: "/static/img/products/sunglasses.jpg".to_string(),
            price_usd: usd(Decimal::new(1999, 2)),
            categories: vec!["accessories".to_string()],
        },
        Product {
            id: ProductId::new("66VCHSJNUP"),
            name: "Tank Top".to_string(),
            description: "Perfectly cropped cotton tank.".to_string(),
            picture: "/static/img/products/tank-top.jpg".to_string(),
            price_usd: usd(Decimal::new(1899, 2)),
            categories: vec!["clothing".to_string(), "tops".to_string()],
        },
        Product {
            id: ProductId::new("1YMWWN1N4O"),
            name: "Watch".to_string(),
            description: "This gold-tone stainless steel watch will work with most of your outfits."
                .to_string(),
            picture: "/static/img/products/watch.jpg".to_string(),
            price_usd: usd(Decimal::new(10999, 2)),
            categories: vec!["accessories".to_string()],
        },
    ]
}

/// In-memory implementation of every downstream service.
///
/// Calls to a service listed in [`FakeBoutique::fail`] return
/// [`ServiceError::Unavailable`].
#[derive(Debug)]
pub struct FakeBoutique {
    products: Vec<Product>,
    rates: HashMap<String, Decimal>,
    carts: Mutex<HashMap<SessionId, Vec<CartItem>>>,
    failing: Mutex<HashSet<ServiceKind>>,
    orders: AtomicU32,
    calls: Mutex<HashMap<ServiceKind, u32>>,
}

impl Default for FakeBoutique {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeBoutique {
    #[must_use]
    pub fn new() -> Self {
        let rates = [
            ("USD", Decimal::ONE),
            ("EUR", Decimal::new(9, 1)),
            ("JPY", Decimal::new(150, 0)),
        ]
        .into_iter()
        .map(|(code, rate)| (code.to_string(), rate))
        .collect();

        Self {
            products: sample_products(),
            rates,
            carts: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            orders: AtomicU32::new(0),
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Make every call to `kind` fail from now on.
    pub fn fail(&self, kind: ServiceKind) {
        lock(&self.failing).insert(kind);
    }

    /// Number of calls made to `kind`, failed ones included.
    #[must_use]
    pub fn calls(&self, kind: ServiceKind) -> u32 {
        lock(&self.calls).get(&kind).copied().unwrap_or(0)
    }

    /// Current cart contents for `user`.
    #[must_use]
    pub fn cart_of(&self, user: &SessionId) -> Vec<CartItem> {
        lock(&self.carts).get(user).cloned().unwrap_or_default()
    }

    fn enter(&self, kind: ServiceKind) -> ServiceResult<()> {
        *lock(&self.calls).entry(kind).or_insert(0) += 1;
        if lock(&self.failing).contains(&kind) {
            return Err(ServiceError::Unavailable {
                service: kind,
                message: "injected failure".to_string(),
            });
        }
        Ok(())
    }

    fn rate(&self, code: &CurrencyCode) -> ServiceResult<Decimal> {
        self.rates
            .get(code.as_str())
            .copied()
            .ok_or_else(|| ServiceError::InvalidArgument {
                service: ServiceKind::Currency,
                message: format!("unsupported currency {code}"),
            })
    }

    fn exchange(&self, from: &Money, to: &CurrencyCode) -> ServiceResult<Money> {
        let in_usd = from.amount / self.rate(&from.currency_code)?;
        Ok(Money::new(in_usd * self.rate(to)?, to.clone()))
    }

    fn find(&self, id: &ProductId) -> ServiceResult<Product> {
        self.products
            .iter()
            .find(|product| &product.id == id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound {
                service: ServiceKind::Catalog,
                message: format!("no product with id {id}"),
            })
    }
}

#[async_trait]
impl CatalogService for FakeBoutique {
    async fn list_products(&self) -> ServiceResult<Vec<Product>> {
        self.enter(ServiceKind::Catalog)?;
        Ok(self.products.clone())
    }

    async fn get_product(&self, id: &ProductId) -> ServiceResult<Product> {
        self.enter(ServiceKind::Catalog)?;
        self.find(id)
    }
}

#[async_trait]
impl CurrencyService for FakeBoutique {
    async fn supported_currencies(&self) -> ServiceResult<Vec<CurrencyCode>> {
        self.enter(ServiceKind::Currency)?;
        let mut codes: Vec<_> = self
            .rates
            .keys()
            .filter_map(|code| CurrencyCode::parse(code).ok())
            .collect();
        codes.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        Ok(codes)
    }

    async fn convert(&self, from: &Money, to: &CurrencyCode) -> ServiceResult<Money> {
        self.enter(ServiceKind::Currency)?;
        self.exchange(from, to)
    }
}

#[async_trait]
impl CartService for FakeBoutique {
    async fn add_item(&self, user_id: &SessionId, item: CartItem) -> ServiceResult<()> {
        self.enter(ServiceKind::Cart)?;
        let mut carts = lock(&self.carts);
        let cart = carts.entry(user_id.clone()).or_default();
        match cart.iter_mut().find(|line| line.product_id == item.product_id) {
            Some(line) => line.quantity += item.quantity,
            None => cart.push(item),
        }
        Ok(())
    }

    async fn get_cart(&self, user_id: &SessionId) -> ServiceResult<Vec<CartItem>> {
        self.enter(ServiceKind::Cart)?;
        Ok(self.cart_of(user_id))
    }

    async fn empty_cart(&self, user_id: &SessionId) -> ServiceResult<()> {
        self.enter(ServiceKind::Cart)?;
        lock(&self.carts).remove(user_id);
        Ok(())
    }
}

#[async_trait]
impl RecommendationService for FakeBoutique {
    async fn list_recommendations(
        &self,
        _user_id: &SessionId,
        product_ids: &[ProductId],
    ) -> ServiceResult<Vec<ProductId>> {
        self.enter(ServiceKind::Recommendation)?;
        Ok(self
            .products
            .iter()
            .map(|product| product.id.clone())
            .filter(|id| !product_ids.contains(id))
            .collect())
    }
}

#[async_trait]
impl CheckoutService for FakeBoutique {
    async fn place_order(&self, request: PlaceOrderRequest) -> ServiceResult<OrderResult> {
        self.enter(ServiceKind::Checkout)?;
        let cart = lock(&self.carts)
            .remove(&request.user_id)
            .unwrap_or_default();
        if cart.is_empty() {
            return Err(ServiceError::InvalidArgument {
                service: ServiceKind::Checkout,
                message: "cart is empty".to_string(),
            });
        }

        let mut items = Vec::with_capacity(cart.len());
        for item in cart {
            let product = self.find(&item.product_id)?;
            let cost = self.exchange(&product.price_usd, &request.user_currency)?;
            items.push(OrderItem { item, cost });
        }

        let n = self.orders.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(OrderResult {
            order_id: OrderId::new(format!("order-{n}")),
            shipping_tracking_id: TrackingId::new(format!("track-{n}")),
            shipping_cost: self.exchange(&usd(SHIPPING_USD), &request.user_currency)?,
            shipping_address: request.address,
            items,
        })
    }
}

#[async_trait]
impl ShippingService for FakeBoutique {
    async fn get_quote(&self, _address: &Address, items: &[CartItem]) -> ServiceResult<Money> {
        self.enter(ServiceKind::Shipping)?;
        if items.is_empty() {
            return Ok(Money::zero(CurrencyCode::usd()));
        }
        Ok(usd(SHIPPING_USD))
    }
}

#[async_trait]
impl AdService for FakeBoutique {
    async fn get_ads(&self, context_keys: &[String]) -> ServiceResult<Vec<Ad>> {
        self.enter(ServiceKind::Ad)?;
        let topic = context_keys.first().map_or("boutique", String::as_str);
        Ok(vec![Ad {
            redirect_url: "/product/OLJCESPC7Z".to_string(),
            text: format!("Deals on {topic}"),
        }])
    }
}

/// Registry handing out one [`FakeBoutique`] for every service.
#[derive(Debug, Clone)]
pub struct FakeRegistry {
    pub boutique: Arc<FakeBoutique>,
    /// Service reported as unconfigured during resolution.
    pub unresolvable: Option<ServiceKind>,
    resolved: Arc<Mutex<Vec<ServiceKind>>>,
}

impl FakeRegistry {
    #[must_use]
    pub fn new(boutique: Arc<FakeBoutique>) -> Self {
        Self {
            boutique,
            unresolvable: None,
            resolved: Arc::new(Mutex::new(Vec::new())),
        }
    }

    #[must_use]
    pub fn without(mut self, kind: ServiceKind) -> Self {
        self.unresolvable = Some(kind);
        self
    }

    /// Services requested so far, in order.
    #[must_use]
    pub fn resolved(&self) -> Vec<ServiceKind> {
        lock(&self.resolved).clone()
    }

    fn handle(&self, kind: ServiceKind) -> Result<Arc<FakeBoutique>, ResolveError> {
        lock(&self.resolved).push(kind);
        if self.unresolvable == Some(kind) {
            return Err(ResolveError::Unconfigured(kind));
        }
        Ok(Arc::clone(&self.boutique))
    }
}

impl ServiceRegistry for FakeRegistry {
    fn catalog(&self) -> Result<Arc<dyn CatalogService>, ResolveError> {
        Ok(self.handle(ServiceKind::Catalog)?)
    }

    fn currency(&self) -> Result<Arc<dyn CurrencyService>, ResolveError> {
        Ok(self.handle(ServiceKind::Currency)?)
    }

    fn cart(&self) -> Result<Arc<dyn CartService>, ResolveError> {
        Ok(self.handle(ServiceKind::Cart)?)
    }

    fn recommendation(&self) -> Result<Arc<dyn RecommendationService>, ResolveError> {
        Ok(self.handle(ServiceKind::Recommendation)?)
    }

    fn checkout(&self) -> Result<Arc<dyn CheckoutService>, ResolveError> {
        Ok(self.handle(ServiceKind::Checkout)?)
    }

    fn shipping(&self) -> Result<Arc<dyn ShippingService>, ResolveError> {
        Ok(self.handle(ServiceKind::Shipping)?)
    }

    fn ad(&self) -> Result<Arc<dyn AdService>, ResolveError> {
        Ok(self.handle(ServiceKind::Ad)?)
    }
}

/// Metadata probe with a canned answer.
#[derive(Debug, Clone)]
pub struct FixedProbe(Option<Vec<IpAddr>>);

impl FixedProbe {
    /// A probe that resolves, as on GCP.
    #[must_use]
    pub fn reachable() -> Self {
        Self(Some(vec![IpAddr::V4(Ipv4Addr::new(169, 254, 169, 254))]))
    }

    /// A probe that fails, as anywhere else.
    #[must_use]
    pub const fn unreachable() -> Self {
        Self(None)
    }
}

#[async_trait]
impl MetadataProbe for FixedProbe {
    async fn lookup(&self, _host: &str) -> Result<Vec<IpAddr>, ProbeError> {
        self.0.clone().ok_or_else(|| {
            ProbeError::Lookup(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no such host",
            ))
        })
    }
}

/// Access log sink that keeps every entry.
#[derive(Debug, Default)]
pub struct RecordingLog(Mutex<Vec<AccessLogEntry>>);

impl RecordingLog {
    #[must_use]
    pub fn entries(&self) -> Vec<AccessLogEntry> {
        lock(&self.0).clone()
    }
}

impl AccessLogSink for RecordingLog {
    fn record(&self, entry: &AccessLogEntry) {
        lock(&self.0).push(entry.clone());
    }
}

/// Static assets mounted by test servers.
#[must_use]
pub fn test_assets() -> StaticAssets {
    StaticAssets::new().insert("css/styles.css", TEST_STYLESHEET)
}

/// Construct a server over `registry` without binding it.
///
/// # Errors
///
/// Propagates [`Server::new`] errors.
pub async fn build_server(
    options: ServerOptions,
    registry: &FakeRegistry,
    probe: &FixedProbe,
) -> Result<Server, ServerError> {
    Server::new(options, registry, probe, test_assets()).await
}

/// A frontend serving on loopback.
pub struct TestApp {
    pub base_url: String,
    pub boutique: Arc<FakeBoutique>,
    pub metrics: Arc<HttpMetrics>,
    pub access_log: Arc<RecordingLog>,
    /// Client that does not follow redirects or keep cookies.
    pub client: reqwest::Client,
}

impl TestApp {
    /// Start a frontend with default options outside GCP.
    pub async fn start() -> Self {
        Self::start_with(None, FixedProbe::unreachable()).await
    }

    /// Start a frontend with the given `ENV_PLATFORM` value and probe.
    pub async fn start_with(env_platform: Option<&str>, probe: FixedProbe) -> Self {
        let boutique = Arc::new(FakeBoutique::new());
        let registry = FakeRegistry::new(Arc::clone(&boutique));
        let access_log = Arc::new(RecordingLog::default());

        let options = ServerOptions {
            env_platform: env_platform.map(str::to_string),
            access_log: Arc::clone(&access_log) as Arc<dyn AccessLogSink>,
            ..ServerOptions::default()
        };
        let server = build_server(options, &registry, &probe)
            .await
            .expect("Failed to construct server");
        let metrics = Arc::clone(server.metrics());

        let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Failed to read local address");
        tokio::spawn(server.serve(listener));

        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: format!("http://{addr}"),
            boutique,
            metrics,
            access_log,
            client,
        }
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// A client that keeps cookies between requests, like a browser.
    #[must_use]
    pub fn browser(&self) -> reqwest::Client {
        reqwest::Client::builder()
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("Failed to create HTTP client")
    }
}

/// Value of the `name` cookie set by `response`, if any.
#[must_use]
pub fn set_cookie(response: &reqwest::Response, name: &str) -> Option<String> {
    set_cookie_headers(response)
        .into_iter()
        .find(|header| header.starts_with(&format!("{name}=")))
}

/// Every `Set-Cookie` header on `response`.
#[must_use]
pub fn set_cookie_headers(response: &reqwest::Response) -> Vec<String> {
    response
        .headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .map(str::to_string)
        .collect()
}

/// The value part of a `name=value; attrs` header.
#[must_use]
pub fn cookie_value(header: &str) -> &str {
    header
        .split(';')
        .next()
        .and_then(|pair| pair.split_once('='))
        .map_or("", |(_, value)| value)
}
