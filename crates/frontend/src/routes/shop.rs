//! Shared building blocks for the storefront pages.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use boutique_core::{Ad, CurrencyCode, Money, Product, ProductId, SessionId};
use rand::seq::IndexedRandom;

use crate::error::{AppError, Result};
use crate::middleware::session::read_cookie;
use crate::state::AppState;

/// Maximum number of recommendations shown on a page.
pub const MAX_RECOMMENDATIONS: usize = 4;

/// Who is asking: the session id and preferred currency.
#[derive(Debug, Clone)]
pub struct Visitor {
    pub session_id: SessionId,
    pub currency: CurrencyCode,
}

impl FromRequestParts<AppState> for Visitor {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Self::Rejection> {
        let session_id = parts
            .extensions
            .get::<SessionId>()
            .cloned()
            .ok_or_else(|| AppError::Internal("session stage not installed".to_string()))?;
        let currency = read_cookie(&parts.headers, &state.cookies().currency_cookie_name())
            .and_then(|raw| CurrencyCode::parse(&raw).ok())
            .unwrap_or_default();
        Ok(Self {
            session_id,
            currency,
        })
    }
}

/// A currency in the header picker.
#[derive(Debug, Clone)]
pub struct CurrencyOption {
    pub code: String,
    pub selected: bool,
}

/// Data every page header needs.
#[derive(Debug, Clone)]
pub struct PageContext {
    pub session_id: String,
    pub user_currency: String,
    pub currencies: Vec<CurrencyOption>,
    pub cart_size: u32,
    pub platform_class: &'static str,
    pub platform_name: &'static str,
    pub hostname: String,
}

impl PageContext {
    /// Load the header data: supported currencies and the cart size.
    ///
    /// # Errors
    ///
    /// Fails if the currency or cart service is unavailable.
    pub async fn load(state: &AppState, visitor: &Visitor) -> Result<Self> {
        let services = state.services();
        let currencies = services.currency.supported_currencies().await?;
        let cart = services.cart.get_cart(&visitor.session_id).await?;
        let platform = state.platform();

        Ok(Self {
            session_id: visitor.session_id.to_string(),
            user_currency: visitor.currency.to_string(),
            currencies: currencies
                .into_iter()
                .map(|code| CurrencyOption {
                    selected: code == visitor.currency,
                    code: code.to_string(),
                })
                .collect(),
            cart_size: cart.iter().map(|item| item.quantity).sum(),
            platform_class: platform.display_class,
            platform_name: platform.provider_name,
            hostname: state.hostname().to_string(),
        })
    }
}

/// A product with its price in the visitor's currency.
#[derive(Debug, Clone)]
pub struct ProductView {
    pub id: String,
    pub name: String,
    pub description: String,
    pub picture: String,
    pub price: String,
}

impl ProductView {
    #[must_use]
    pub fn new(product: &Product, price: &Money) -> Self {
        Self {
            id: product.id.to_string(),
            name: product.name.clone(),
            description: product.description.clone(),
            picture: product.picture.clone(),
            price: price.to_string(),
        }
    }
}

/// An ad ready for display.
#[derive(Debug, Clone)]
pub struct AdView {
    pub redirect_url: String,
    pub text: String,
}

impl From<Ad> for AdView {
    fn from(ad: Ad) -> Self {
        Self {
            redirect_url: ad.redirect_url,
            text: ad.text,
        }
    }
}

/// Convert `money` into `to`, skipping the call when already there.
///
/// # Errors
///
/// Fails if the currency service rejects the conversion.
pub async fn convert(state: &AppState, money: &Money, to: &CurrencyCode) -> Result<Money> {
    if &money.currency_code == to {
        return Ok(money.clone());
    }
    Ok(state.services().currency.convert(money, to).await?)
}

/// Price `product` in the visitor's currency.
///
/// # Errors
///
/// Fails if the currency service rejects the conversion.
pub async fn product_view(
    state: &AppState,
    product: &Product,
    currency: &CurrencyCode,
) -> Result<ProductView> {
    let price = convert(state, &product.price_usd, currency).await?;
    Ok(ProductView::new(product, &price))
}

/// Pick one ad for `context_keys`. Failures are logged and yield no ad.
pub async fn choose_ad(state: &AppState, context_keys: &[String]) -> Option<AdView> {
    match state.services().ad.get_ads(context_keys).await {
        Ok(ads) => ads.choose(&mut rand::rng()).cloned().map(AdView::from),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to retrieve ads");
            None
        }
    }
}

/// Up to [`MAX_RECOMMENDATIONS`] products related to `product_ids`,
/// excluding those ids. Failures are logged and yield an empty list.
pub async fn recommendations(
    state: &AppState,
    visitor: &Visitor,
    product_ids: &[ProductId],
) -> Vec<ProductView> {
    let services = state.services();
    let ids = match services
        .recommendation
        .list_recommendations(&visitor.session_id, product_ids)
        .await
    {
        Ok(ids) => ids,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to get product recommendations");
            return Vec::new();
        }
    };

    let mut views = Vec::with_capacity(MAX_RECOMMENDATIONS);
    for id in ids.iter().filter(|id| !product_ids.contains(id)) {
        if views.len() == MAX_RECOMMENDATIONS {
            break;
        }
        let view = match services.catalog.get_product(id).await {
            Ok(product) => product_view(state, &product, &visitor.currency).await,
            Err(e) => Err(e.into()),
        };
        match view {
            Ok(view) => views.push(view),
            Err(e) => {
                tracing::warn!(error = %e, product_id = %id, "Skipping recommendation");
            }
        }
    }
    views
}
