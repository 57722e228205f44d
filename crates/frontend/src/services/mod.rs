//! Downstream service contracts.
//!
//! The frontend talks to seven backend services. Each is modelled as an
//! object-safe async trait so handlers depend on behaviour, not transport.
//! [`registry`] resolves concrete handles at startup and [`http`] provides
//! the production JSON adapter.

pub mod http;
pub mod registry;

use std::fmt;

use async_trait::async_trait;
use boutique_core::{
    Ad, Address, CartItem, CurrencyCode, Money, OrderResult, PlaceOrderRequest, Product,
    ProductId, SessionId,
};
use thiserror::Error;

pub use registry::{ResolveError, ServiceHandles, ServiceRegistry};

/// The seven downstream services, in resolution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ServiceKind {
    Catalog,
    Currency,
    Cart,
    Recommendation,
    Checkout,
    Shipping,
    Ad,
}

impl ServiceKind {
    /// All services, in the order they are resolved.
    pub const ALL: [Self; 7] = [
        Self::Catalog,
        Self::Currency,
        Self::Cart,
        Self::Recommendation,
        Self::Checkout,
        Self::Shipping,
        Self::Ad,
    ];

    /// Short service name used in logs and errors.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Catalog => "productcatalog",
            Self::Currency => "currency",
            Self::Cart => "cart",
            Self::Recommendation => "recommendation",
            Self::Checkout => "checkout",
            Self::Shipping => "shipping",
            Self::Ad => "ad",
        }
    }

    /// Environment variable holding the service's base address.
    #[must_use]
    pub const fn address_env_var(self) -> &'static str {
        match self {
            Self::Catalog => "PRODUCT_CATALOG_SERVICE_ADDR",
            Self::Currency => "CURRENCY_SERVICE_ADDR",
            Self::Cart => "CART_SERVICE_ADDR",
            Self::Recommendation => "RECOMMENDATION_SERVICE_ADDR",
            Self::Checkout => "CHECKOUT_SERVICE_ADDR",
            Self::Shipping => "SHIPPING_SERVICE_ADDR",
            Self::Ad => "AD_SERVICE_ADDR",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors returned by downstream calls.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{service}: not found: {message}")]
    NotFound {
        service: ServiceKind,
        message: String,
    },
    #[error("{service}: invalid argument: {message}")]
    InvalidArgument {
        service: ServiceKind,
        message: String,
    },
    #[error("{service} unavailable: {message}")]
    Unavailable {
        service: ServiceKind,
        message: String,
    },
}

impl ServiceError {
    /// The service that produced the error.
    #[must_use]
    pub const fn service(&self) -> ServiceKind {
        match self {
            Self::NotFound { service, .. }
            | Self::InvalidArgument { service, .. }
            | Self::Unavailable { service, .. } => *service,
        }
    }
}

/// Result alias for downstream calls.
pub type ServiceResult<T> = Result<T, ServiceError>;

#[async_trait]
pub trait CatalogService: Send + Sync {
    async fn list_products(&self) -> ServiceResult<Vec<Product>>;
    async fn get_product(&self, id: &ProductId) -> ServiceResult<Product>;
}

#[async_trait]
pub trait CurrencyService: Send + Sync {
    async fn supported_currencies(&self) -> ServiceResult<Vec<CurrencyCode>>;
    async fn convert(&self, from: &Money, to: &CurrencyCode) -> ServiceResult<Money>;
}

#[async_trait]
pub trait CartService: Send + Sync {
    async fn add_item(&self, user_id: &SessionId, item: CartItem) -> ServiceResult<()>;
    async fn get_cart(&self, user_id: &SessionId) -> ServiceResult<Vec<CartItem>>;
    async fn empty_cart(&self, user_id: &SessionId) -> ServiceResult<()>;
}

#[async_trait]
pub trait RecommendationService: Send + Sync {
    /// Product ids related to `product_ids`, for the given visitor.
    async fn list_recommendations(
        &self,
        user_id: &SessionId,
        product_ids: &[ProductId],
    ) -> ServiceResult<Vec<ProductId>>;
}

#[async_trait]
pub trait CheckoutService: Send + Sync {
    async fn place_order(&self, request: PlaceOrderRequest) -> ServiceResult<OrderResult>;
}

#[async_trait]
pub trait ShippingService: Send + Sync {
    /// Shipping cost for `items` to `address`, in USD.
    async fn get_quote(&self, address: &Address, items: &[CartItem]) -> ServiceResult<Money>;
}

#[async_trait]
pub trait AdService: Send + Sync {
    async fn get_ads(&self, context_keys: &[String]) -> ServiceResult<Vec<Ad>>;
}
