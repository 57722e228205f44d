//! Cart route handlers.
//!
//! Carts are keyed by the visitor's session id. Every mutation answers with
//! a `303 See Other` so a browser refresh never re-submits the form.

use askama::Template;
use askama_web::WebTemplate;
use axum::Form;
use axum::extract::State;
use axum::response::Redirect;
use boutique_core::{Address, CartItem, Money, ProductId};
use serde::Deserialize;
use tracing::instrument;

use super::shop::{PageContext, ProductView, Visitor, convert, product_view, recommendations};
use crate::error::{AppError, Result};
use crate::state::AppState;

/// Largest quantity accepted in a single add.
pub const MAX_QUANTITY: u32 = 10;

/// Years offered in the card expiry picker.
const EXPIRATION_YEARS: i32 = 5;

/// A cart line with product details and its converted total.
#[derive(Debug, Clone)]
pub struct CartLineView {
    pub product: ProductView,
    pub quantity: u32,
    pub total: String,
}

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "pages/cart.html")]
pub struct CartTemplate {
    pub page: PageContext,
    pub items: Vec<CartLineView>,
    pub shipping_cost: String,
    pub total_cost: String,
    pub expiration_years: Vec<i32>,
    pub recommendations: Vec<ProductView>,
}

/// Display the visitor's cart with a shipping quote and checkout form.
#[instrument(skip(state, visitor), fields(currency = %visitor.currency))]
pub async fn view_cart(State(state): State<AppState>, visitor: Visitor) -> Result<CartTemplate> {
    let services = state.services();
    let page = PageContext::load(&state, &visitor).await?;
    let cart = services.cart.get_cart(&visitor.session_id).await?;

    let quote = services.shipping.get_quote(&Address::default(), &cart).await?;
    let shipping = convert(&state, &quote, &visitor.currency).await?;

    let mut total = shipping.clone();
    let mut items = Vec::with_capacity(cart.len());
    for item in &cart {
        let product = services.catalog.get_product(&item.product_id).await?;
        let price = convert(&state, &product.price_usd, &visitor.currency).await?;
        let line_total = price.times(item.quantity)?;
        total = total.checked_add(&line_total)?;
        items.push(CartLineView {
            product: ProductView::new(&product, &price),
            quantity: item.quantity,
            total: line_total.to_string(),
        });
    }

    let ids: Vec<ProductId> = cart.iter().map(|item| item.product_id.clone()).collect();
    let recommendations = recommendations(&state, &visitor, &ids).await;

    Ok(CartTemplate {
        page,
        items,
        shipping_cost: shipping.to_string(),
        total_cost: total.to_string(),
        expiration_years: expiration_years(),
        recommendations,
    })
}

/// Add to cart form data.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    #[serde(default)]
    pub product_id: String,
    #[serde(default)]
    pub quantity: String,
}

impl AddToCartForm {
    fn validate(&self) -> Result<CartItem> {
        let product_id = self.product_id.trim();
        if product_id.is_empty() {
            return Err(AppError::BadRequest("product id not specified".to_string()));
        }
        let quantity = self
            .quantity
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|q| (1..=MAX_QUANTITY).contains(q))
            .ok_or_else(|| {
                AppError::BadRequest(format!("quantity must be between 1 and {MAX_QUANTITY}"))
            })?;
        Ok(CartItem::new(ProductId::new(product_id), quantity))
    }
}

/// Add a product to the cart.
#[instrument(skip(state, visitor))]
pub async fn add_to_cart(
    State(state): State<AppState>,
    visitor: Visitor,
    Form(form): Form<AddToCartForm>,
) -> Result<Redirect> {
    let item = form.validate()?;
    let services = state.services();

    // Reject unknown products before touching the cart.
    services.catalog.get_product(&item.product_id).await?;
    services.cart.add_item(&visitor.session_id, item).await?;

    Ok(Redirect::to("/cart"))
}

/// Remove every item from the cart.
#[instrument(skip(state, visitor))]
pub async fn empty_cart(State(state): State<AppState>, visitor: Visitor) -> Result<Redirect> {
    state.services().cart.empty_cart(&visitor.session_id).await?;
    Ok(Redirect::to("/"))
}

/// This year and the next few, for the card expiry picker.
fn expiration_years() -> Vec<i32> {
    let current = cookie::time::OffsetDateTime::now_utc().year();
    (current..current + EXPIRATION_YEARS).collect()
}

/// Sum of `cost * quantity` over `lines`, plus `shipping`.
///
/// # Errors
///
/// Fails if the lines are priced in different currencies or the sum is out
/// of range.
pub fn order_total<'a>(
    shipping: &Money,
    lines: impl IntoIterator<Item = (&'a Money, u32)>,
) -> std::result::Result<Money, boutique_core::MoneyError> {
    lines
        .into_iter()
        .try_fold(shipping.clone(), |total, (cost, quantity)| {
            total.checked_add(&cost.times(quantity)?)
        })
}
