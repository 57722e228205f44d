//! Startup resolution of downstream service handles.

use std::sync::Arc;

use thiserror::Error;

use super::{
    AdService, CartService, CatalogService, CheckoutService, CurrencyService,
    RecommendationService, ServiceKind, ShippingService,
};

/// Failure to obtain a handle to a downstream service. Always fatal.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no address configured for {0} service")]
    Unconfigured(ServiceKind),
    #[error("invalid address for {service} service: {reason}")]
    InvalidAddress { service: ServiceKind, reason: String },
    #[error("{service} service unavailable: {reason}")]
    Unavailable { service: ServiceKind, reason: String },
}

impl ResolveError {
    /// The service whose resolution failed.
    #[must_use]
    pub const fn service(&self) -> ServiceKind {
        match self {
            Self::Unconfigured(service)
            | Self::InvalidAddress { service, .. }
            | Self::Unavailable { service, .. } => *service,
        }
    }
}

/// Source of downstream service handles.
pub trait ServiceRegistry: Send + Sync {
    fn catalog(&self) -> Result<Arc<dyn CatalogService>, ResolveError>;
    fn currency(&self) -> Result<Arc<dyn CurrencyService>, ResolveError>;
    fn cart(&self) -> Result<Arc<dyn CartService>, ResolveError>;
    fn recommendation(&self) -> Result<Arc<dyn RecommendationService>, ResolveError>;
    fn checkout(&self) -> Result<Arc<dyn CheckoutService>, ResolveError>;
    fn shipping(&self) -> Result<Arc<dyn ShippingService>, ResolveError>;
    fn ad(&self) -> Result<Arc<dyn AdService>, ResolveError>;
}

/// The full set of resolved handles. Exists only when all seven resolved.
#[derive(Clone)]
pub struct ServiceHandles {
    pub catalog: Arc<dyn CatalogService>,
    pub currency: Arc<dyn CurrencyService>,
    pub cart: Arc<dyn CartService>,
    pub recommendation: Arc<dyn RecommendationService>,
    pub checkout: Arc<dyn CheckoutService>,
    pub shipping: Arc<dyn ShippingService>,
    pub ad: Arc<dyn AdService>,
}

impl ServiceHandles {
    /// Resolve every handle in [`ServiceKind::ALL`] order.
    ///
    /// # Errors
    ///
    /// Returns the first [`ResolveError`]; later services are not attempted.
    pub fn resolve(registry: &dyn ServiceRegistry) -> Result<Self, ResolveError> {
        let handles = Self {
            catalog: registry.catalog()?,
            currency: registry.currency()?,
            cart: registry.cart()?,
            recommendation: registry.recommendation()?,
            checkout: registry.checkout()?,
            shipping: registry.shipping()?,
            ad: registry.ad()?,
        };
        tracing::debug!(count = ServiceKind::ALL.len(), "Resolved downstream services");
        Ok(handles)
    }
}

impl std::fmt::Debug for ServiceHandles {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceHandles").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use boutique_core::{
        Ad, Address, CartItem, CurrencyCode, Money, OrderResult, PlaceOrderRequest, Product,
        ProductId, SessionId,
    };

    use super::*;
    use crate::services::ServiceResult;

    struct Nothing;

    #[async_trait]
    impl CatalogService for Nothing {
        async fn list_products(&self) -> ServiceResult<Vec<Product>> {
            Ok(Vec::new())
        }
        async fn get_product(&self, id: &ProductId) -> ServiceResult<Product> {
            Err(crate::services::ServiceError::NotFound {
                service: ServiceKind::Catalog,
                message: id.to_string(),
            })
        }
    }

    #[async_trait]
    impl CurrencyService for Nothing {
        async fn supported_currencies(&self) -> ServiceResult<Vec<CurrencyCode>> {
            Ok(vec![CurrencyCode::usd()])
        }
        async fn convert(&self, from: &Money, _to: &CurrencyCode) -> ServiceResult<Money> {
            Ok(from.clone())
        }
    }

    #[async_trait]
    impl CartService for Nothing {
        async fn add_item(&self, _user_id: &SessionId, _item: CartItem) -> ServiceResult<()> {
            Ok(())
        }
        async fn get_cart(&self, _user_id: &SessionId) -> ServiceResult<Vec<CartItem>> {
            Ok(Vec::new())
        }
        async fn empty_cart(&self, _user_id: &SessionId) -> ServiceResult<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl RecommendationService for Nothing {
        async fn list_recommendations(
            &self,
            _user_id: &SessionId,
            _product_ids: &[ProductId],
        ) -> ServiceResult<Vec<ProductId>> {
            Ok(Vec::new())
        }
    }

    #[async_trait]
    impl CheckoutService for Nothing {
        async fn place_order(&self, _request: PlaceOrderRequest) -> ServiceResult<OrderResult> {
            Err(crate::services::ServiceError::Unavailable {
                service: ServiceKind::Checkout,
                message: "closed".to_string(),
            })
        }
    }

    #[async_trait]
    impl ShippingService for Nothing {
        async fn get_quote(&self, _address: &Address, _items: &[CartItem]) -> ServiceResult<Money> {
            Ok(Money::zero(CurrencyCode::usd()))
        }
    }

    #[async_trait]
    impl AdService for Nothing {
        async fn get_ads(&self, _context_keys: &[String]) -> ServiceResult<Vec<Ad>> {
            Ok(Vec::new())
        }
    }

    /// Registry that records each request and fails at one service.
    struct Recording {
        fail_at: Option<ServiceKind>,
        calls: Mutex<Vec<ServiceKind>>,
    }

    impl Recording {
        fn new(fail_at: Option<ServiceKind>) -> Self {
            Self {
                fail_at,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn visit(&self, kind: ServiceKind) -> Result<Arc<Nothing>, ResolveError> {
            self.calls.lock().unwrap().push(kind);
            if self.fail_at == Some(kind) {
                return Err(ResolveError::Unavailable {
                    service: kind,
                    reason: "refused".to_string(),
                });
            }
            Ok(Arc::new(Nothing))
        }
    }

    impl ServiceRegistry for Recording {
        fn catalog(&self) -> Result<Arc<dyn CatalogService>, ResolveError> {
            Ok(self.visit(ServiceKind::Catalog)?)
        }
        fn currency(&self) -> Result<Arc<dyn CurrencyService>, ResolveError> {
            Ok(self.visit(ServiceKind::Currency)?)
        }
        fn cart(&self) -> Result<Arc<dyn CartService>, ResolveError> {
            Ok(self.visit(ServiceKind::Cart)?)
        }
        fn recommendation(&self) -> Result<Arc<dyn RecommendationService>, ResolveError> {
            Ok(self.visit(ServiceKind::Recommendation)?)
        }
        fn checkout(&self) -> Result<Arc<dyn CheckoutService>, ResolveError> {
            Ok(self.visit(ServiceKind::Checkout)?)
        }
        fn shipping(&self) -> Result<Arc<dyn ShippingService>, ResolveError> {
            Ok(self.visit(ServiceKind::Shipping)?)
        }
        fn ad(&self) -> Result<Arc<dyn AdService>, ResolveError> {
            Ok(self.visit(ServiceKind::Ad)?)
        }
    }

    #[test]
    fn test_resolves_all_in_order() {
        let registry = Recording::new(None);
        assert!(ServiceHandles::resolve(&registry).is_ok());
        assert_eq!(*registry.calls.lock().unwrap(), ServiceKind::ALL);
    }

    #[test]
    fn test_first_failure_stops_resolution() {
        for (index, kind) in ServiceKind::ALL.into_iter().enumerate() {
            let registry = Recording::new(Some(kind));
            let err = ServiceHandles::resolve(&registry).unwrap_err();
            assert_eq!(err.service(), kind);
            assert_eq!(
                registry.calls.lock().unwrap().as_slice(),
                &ServiceKind::ALL[..=index]
            );
        }
    }

    #[test]
    fn test_resolve_error_messages_name_service() {
        assert_eq!(
            ResolveError::Unconfigured(ServiceKind::Ad).to_string(),
            "no address configured for ad service"
        );
    }
}
