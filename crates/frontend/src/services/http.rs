//! JSON-over-HTTP adapter for the downstream services.
//!
//! Every operation is a `POST {base}/{operation}` with a JSON body. Status
//! codes map onto [`ServiceError`]: 404 is `NotFound`, 400 is
//! `InvalidArgument`, anything else unsuccessful (or a transport failure) is
//! `Unavailable`. Product lookups are cached for 5 minutes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use boutique_core::{
    Ad, Address, CartItem, CurrencyCode, Money, OrderResult, PlaceOrderRequest, Product,
    ProductId, SessionId,
};
use moka::future::Cache;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::instrument;
use url::Url;

use super::registry::{ResolveError, ServiceRegistry};
use super::{
    AdService, CartService, CatalogService, CheckoutService, CurrencyService,
    RecommendationService, ServiceError, ServiceKind, ServiceResult, ShippingService,
};
use crate::config::ServiceAddresses;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const CATALOG_CACHE_TTL: Duration = Duration::from_secs(300);
const CATALOG_CACHE_CAPACITY: u64 = 1000;

/// [`ServiceRegistry`] that builds JSON clients from configured addresses.
#[derive(Clone)]
pub struct HttpServiceRegistry {
    http: reqwest::Client,
    addresses: ServiceAddresses,
}

impl HttpServiceRegistry {
    /// Create a registry sharing one connection pool across all clients.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(addresses: &ServiceAddresses) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            addresses: addresses.clone(),
        })
    }

    fn client(&self, service: ServiceKind) -> Result<JsonClient, ResolveError> {
        let base = endpoint(service, self.addresses.get(service))?;
        tracing::debug!(%service, %base, "Resolved service endpoint");
        Ok(JsonClient {
            service,
            base,
            http: self.http.clone(),
        })
    }
}

impl ServiceRegistry for HttpServiceRegistry {
    fn catalog(&self) -> Result<Arc<dyn CatalogService>, ResolveError> {
        Ok(Arc::new(HttpCatalog::new(self.client(ServiceKind::Catalog)?)))
    }

    fn currency(&self) -> Result<Arc<dyn CurrencyService>, ResolveError> {
        Ok(Arc::new(HttpCurrency(self.client(ServiceKind::Currency)?)))
    }

    fn cart(&self) -> Result<Arc<dyn CartService>, ResolveError> {
        Ok(Arc::new(HttpCart(self.client(ServiceKind::Cart)?)))
    }

    fn recommendation(&self) -> Result<Arc<dyn RecommendationService>, ResolveError> {
        Ok(Arc::new(HttpRecommendation(
            self.client(ServiceKind::Recommendation)?,
        )))
    }

    fn checkout(&self) -> Result<Arc<dyn CheckoutService>, ResolveError> {
        Ok(Arc::new(HttpCheckout(self.client(ServiceKind::Checkout)?)))
    }

    fn shipping(&self) -> Result<Arc<dyn ShippingService>, ResolveError> {
        Ok(Arc::new(HttpShipping(self.client(ServiceKind::Shipping)?)))
    }

    fn ad(&self) -> Result<Arc<dyn AdService>, ResolveError> {
        Ok(Arc::new(HttpAd(self.client(ServiceKind::Ad)?)))
    }
}

/// Parse a configured address into a base URL ending in `/`.
///
/// Bare `host:port` addresses are treated as `http://host:port/`.
fn endpoint(service: ServiceKind, address: Option<&str>) -> Result<Url, ResolveError> {
    let raw = address
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .ok_or(ResolveError::Unconfigured(service))?;

    let with_scheme = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{raw}")
    };

    let mut url = Url::parse(&with_scheme).map_err(|e| ResolveError::InvalidAddress {
        service,
        reason: e.to_string(),
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ResolveError::InvalidAddress {
            service,
            reason: format!("unsupported scheme `{}`", url.scheme()),
        });
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(ResolveError::InvalidAddress {
            service,
            reason: "missing host".to_string(),
        });
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

// =============================================================================
// JsonClient
// =============================================================================

#[derive(Clone)]
struct JsonClient {
    service: ServiceKind,
    base: Url,
    http: reqwest::Client,
}

impl JsonClient {
    fn unavailable(&self, message: impl Into<String>) -> ServiceError {
        ServiceError::Unavailable {
            service: self.service,
            message: message.into(),
        }
    }

    async fn send<B: Serialize + Sync + ?Sized>(
        &self,
        operation: &str,
        body: &B,
    ) -> ServiceResult<reqwest::Response> {
        let url = self
            .base
            .join(operation)
            .map_err(|e| self.unavailable(e.to_string()))?;

        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| self.unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let message: String = text.chars().take(200).collect();
        tracing::warn!(
            service = %self.service,
            operation,
            status = %status,
            body = %message,
            "Downstream call returned non-success status"
        );

        Err(match status {
            reqwest::StatusCode::NOT_FOUND => ServiceError::NotFound {
                service: self.service,
                message,
            },
            reqwest::StatusCode::BAD_REQUEST => ServiceError::InvalidArgument {
                service: self.service,
                message,
            },
            _ => self.unavailable(format!("HTTP {status}: {message}")),
        })
    }

    async fn call<B, R>(&self, operation: &str, body: &B) -> ServiceResult<R>
    where
        B: Serialize + Sync + ?Sized,
        R: DeserializeOwned,
    {
        self.send(operation, body)
            .await?
            .json::<R>()
            .await
            .map_err(|e| self.unavailable(format!("malformed response: {e}")))
    }

    async fn call_unit<B: Serialize + Sync + ?Sized>(
        &self,
        operation: &str,
        body: &B,
    ) -> ServiceResult<()> {
        self.send(operation, body).await.map(|_| ())
    }
}

// =============================================================================
// Catalog
// =============================================================================

#[derive(Clone)]
enum CatalogEntry {
    Product(Box<Product>),
    Listing(Arc<Vec<Product>>),
}

const LISTING_KEY: &str = "products";

struct HttpCatalog {
    client: JsonClient,
    cache: Cache<String, CatalogEntry>,
}

impl HttpCatalog {
    fn new(client: JsonClient) -> Self {
        let cache = Cache::builder()
            .max_capacity(CATALOG_CACHE_CAPACITY)
            .time_to_live(CATALOG_CACHE_TTL)
            .build();
        Self { client, cache }
    }
}

#[derive(Deserialize)]
struct ListProductsResponse {
    products: Vec<Product>,
}

#[async_trait]
impl CatalogService for HttpCatalog {
    #[instrument(skip(self))]
    async fn list_products(&self) -> ServiceResult<Vec<Product>> {
        if let Some(CatalogEntry::Listing(products)) = self.cache.get(LISTING_KEY).await {
            tracing::debug!("Cache hit for product listing");
            return Ok(products.as_ref().clone());
        }

        let response: ListProductsResponse = self.client.call("list_products", &json!({})).await?;
        self.cache
            .insert(
                LISTING_KEY.to_string(),
                CatalogEntry::Listing(Arc::new(response.products.clone())),
            )
            .await;
        Ok(response.products)
    }

    #[instrument(skip(self), fields(product_id = %id))]
    async fn get_product(&self, id: &ProductId) -> ServiceResult<Product> {
        let key = format!("product:{id}");
        if let Some(CatalogEntry::Product(product)) = self.cache.get(&key).await {
            tracing::debug!("Cache hit for product");
            return Ok(*product);
        }

        let product: Product = self.client.call("get_product", &json!({ "id": id })).await?;
        self.cache
            .insert(key, CatalogEntry::Product(Box::new(product.clone())))
            .await;
        Ok(product)
    }
}

// =============================================================================
// Currency
// =============================================================================

struct HttpCurrency(JsonClient);

#[derive(Deserialize)]
struct CurrenciesResponse {
    currency_codes: Vec<CurrencyCode>,
}

#[async_trait]
impl CurrencyService for HttpCurrency {
    async fn supported_currencies(&self) -> ServiceResult<Vec<CurrencyCode>> {
        let response: CurrenciesResponse = self
            .0
            .call("get_supported_currencies", &json!({}))
            .await?;
        Ok(response.currency_codes)
    }

    async fn convert(&self, from: &Money, to: &CurrencyCode) -> ServiceResult<Money> {
        self.0
            .call("convert", &json!({ "from": from, "to_code": to }))
            .await
    }
}

// =============================================================================
// Cart
// =============================================================================

struct HttpCart(JsonClient);

#[derive(Deserialize)]
struct CartResponse {
    #[serde(default)]
    items: Vec<CartItem>,
}

#[async_trait]
impl CartService for HttpCart {
    async fn add_item(&self, user_id: &SessionId, item: CartItem) -> ServiceResult<()> {
        self.0
            .call_unit("add_item", &json!({ "user_id": user_id, "item": item }))
            .await
    }

    async fn get_cart(&self, user_id: &SessionId) -> ServiceResult<Vec<CartItem>> {
        let response: CartResponse = self
            .0
            .call("get_cart", &json!({ "user_id": user_id }))
            .await?;
        Ok(response.items)
    }

    async fn empty_cart(&self, user_id: &SessionId) -> ServiceResult<()> {
        self.0
            .call_unit("empty_cart", &json!({ "user_id": user_id }))
            .await
    }
}

// =============================================================================
// Recommendation, checkout, shipping, ads
// =============================================================================

struct HttpRecommendation(JsonClient);

#[derive(Deserialize)]
struct RecommendationsResponse {
    product_ids: Vec<ProductId>,
}

#[async_trait]
impl RecommendationService for HttpRecommendation {
    async fn list_recommendations(
        &self,
        user_id: &SessionId,
        product_ids: &[ProductId],
    ) -> ServiceResult<Vec<ProductId>> {
        let response: RecommendationsResponse = self
            .0
            .call(
                "list_recommendations",
                &json!({ "user_id": user_id, "product_ids": product_ids }),
            )
            .await?;
        Ok(response.product_ids)
    }
}

struct HttpCheckout(JsonClient);

#[derive(Deserialize)]
struct PlaceOrderResponse {
    order: OrderResult,
}

#[async_trait]
impl CheckoutService for HttpCheckout {
    async fn place_order(&self, request: PlaceOrderRequest) -> ServiceResult<OrderResult> {
        let response: PlaceOrderResponse = self.0.call("place_order", &request).await?;
        Ok(response.order)
    }
}

struct HttpShipping(JsonClient);

#[derive(Deserialize)]
struct QuoteResponse {
    cost_usd: Money,
}

#[async_trait]
impl ShippingService for HttpShipping {
    async fn get_quote(&self, address: &Address, items: &[CartItem]) -> ServiceResult<Money> {
        let response: QuoteResponse = self
            .0
            .call("get_quote", &json!({ "address": address, "items": items }))
            .await?;
        Ok(response.cost_usd)
    }
}

struct HttpAd(JsonClient);

#[derive(Deserialize)]
struct AdsResponse {
    #[serde(default)]
    ads: Vec<Ad>,
}

#[async_trait]
impl AdService for HttpAd {
    async fn get_ads(&self, context_keys: &[String]) -> ServiceResult<Vec<Ad>> {
        let response: AdsResponse = self
            .0
            .call("get_ads", &json!({ "context_keys": context_keys }))
            .await?;
        Ok(response.ads)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};

    use super::*;

    #[test]
    fn test_endpoint_requires_address() {
        assert!(matches!(
            endpoint(ServiceKind::Cart, None),
            Err(ResolveError::Unconfigured(ServiceKind::Cart))
        ));
        assert!(matches!(
            endpoint(ServiceKind::Cart, Some("  ")),
            Err(ResolveError::Unconfigured(ServiceKind::Cart))
        ));
    }

    #[test]
    fn test_endpoint_normalizes_bare_host_port() {
        let url = endpoint(ServiceKind::Ad, Some("adservice:9555")).unwrap();
        assert_eq!(url.as_str(), "http://adservice:9555/");
        let url = endpoint(ServiceKind::Ad, Some("https://ads.internal/v1")).unwrap();
        assert_eq!(url.join("get_ads").unwrap().as_str(), "https://ads.internal/v1/get_ads");
    }

    #[test]
    fn test_endpoint_rejects_unsupported_scheme() {
        let err = endpoint(ServiceKind::Shipping, Some("ftp://shipping:21")).unwrap_err();
        assert!(matches!(
            err,
            ResolveError::InvalidAddress {
                service: ServiceKind::Shipping,
                ..
            }
        ));
    }

    #[test]
    fn test_registry_fails_fast_on_missing_address() {
        let addresses = ServiceAddresses::default()
            .with(ServiceKind::Catalog, "http://127.0.0.1:1")
            .with(ServiceKind::Currency, "http://127.0.0.1:1");
        let registry = HttpServiceRegistry::new(&addresses).unwrap();
        let err = crate::services::ServiceHandles::resolve(&registry).unwrap_err();
        assert_eq!(err.service(), ServiceKind::Cart);
    }

    async fn spawn(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn sample_product() -> serde_json::Value {
        json!({
            "id": "OLJCESPC7Z",
            "name": "Sunglasses",
            "description": "Add a modern touch to your outfits.",
            "picture": "/static/img/products/sunglasses.jpg",
            "price_usd": { "currency_code": "USD", "amount": "19.99" },
            "categories": ["accessories"]
        })
    }

    #[tokio::test]
    async fn test_catalog_caches_product_lookups() {
        let hits = Arc::new(AtomicUsize::new(0));
        let router = Router::new()
            .route(
                "/get_product",
                post(|State(hits): State<Arc<AtomicUsize>>| async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    Json(sample_product())
                }),
            )
            .with_state(Arc::clone(&hits));
        let base = spawn(router).await;

        let registry =
            HttpServiceRegistry::new(&ServiceAddresses::default().with(ServiceKind::Catalog, &base))
                .unwrap();
        let catalog = registry.catalog().unwrap();

        let id = ProductId::new("OLJCESPC7Z");
        let first = catalog.get_product(&id).await.unwrap();
        let second = catalog.get_product(&id).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.name, "Sunglasses");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_status_codes_map_to_service_errors() {
        let router = Router::new()
            .route("/get_product", post(|| async { StatusCode::NOT_FOUND }))
            .route("/convert", post(|| async { (StatusCode::BAD_REQUEST, "bad code") }))
            .route(
                "/get_supported_currencies",
                post(|| async { StatusCode::SERVICE_UNAVAILABLE }),
            );
        let base = spawn(router).await;
        let addresses = ServiceAddresses::default()
            .with(ServiceKind::Catalog, &base)
            .with(ServiceKind::Currency, &base);
        let registry = HttpServiceRegistry::new(&addresses).unwrap();

        let err = registry
            .catalog()
            .unwrap()
            .get_product(&ProductId::new("missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { .. }));

        let currency = registry.currency().unwrap();
        let err = currency
            .convert(
                &Money::zero(CurrencyCode::usd()),
                &CurrencyCode::parse("EUR").unwrap(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidArgument { ref message, .. } if message == "bad code"));

        let err = currency.supported_currencies().await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Unavailable {
                service: ServiceKind::Currency,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_transport_failure_is_unavailable() {
        // Bind then drop to get a port nothing listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let registry = HttpServiceRegistry::new(
            &ServiceAddresses::default().with(ServiceKind::Cart, &format!("http://{addr}")),
        )
        .unwrap();
        let err = registry
            .cart()
            .unwrap()
            .get_cart(&SessionId::generate())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unavailable { .. }));
    }
}
