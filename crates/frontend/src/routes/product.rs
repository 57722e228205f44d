//! Product detail route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::{Path, State};
use boutique_core::ProductId;
use tracing::instrument;

use super::shop::{
    AdView, PageContext, ProductView, Visitor, choose_ad, product_view, recommendations,
};
use crate::error::{AppError, Result};
use crate::state::AppState;

/// Product detail template.
#[derive(Template, WebTemplate)]
#[template(path = "pages/product.html")]
pub struct ProductTemplate {
    pub page: PageContext,
    pub product: ProductView,
    pub recommendations: Vec<ProductView>,
    pub ad: Option<AdView>,
}

/// Display a single product.
#[instrument(skip(state, visitor))]
pub async fn product(
    State(state): State<AppState>,
    visitor: Visitor,
    Path(id): Path<String>,
) -> Result<ProductTemplate> {
    let id = id.trim();
    if id.is_empty() {
        return Err(AppError::BadRequest("product id not specified".to_string()));
    }
    let id = ProductId::new(id);

    let product = state.services().catalog.get_product(&id).await?;
    let page = PageContext::load(&state, &visitor).await?;
    let view = product_view(&state, &product, &visitor.currency).await?;
    let recommendations = recommendations(&state, &visitor, std::slice::from_ref(&id)).await;
    let ad = choose_ad(&state, &product.categories).await;

    Ok(ProductTemplate {
        page,
        product: view,
        recommendations,
        ad,
    })
}
