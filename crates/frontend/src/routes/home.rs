//! Home page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::State;
use tracing::instrument;

use super::shop::{AdView, PageContext, ProductView, Visitor, choose_ad, product_view};
use crate::error::Result;
use crate::state::AppState;

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "pages/home.html")]
pub struct HomeTemplate {
    pub page: PageContext,
    pub products: Vec<ProductView>,
    pub ad: Option<AdView>,
}

/// Display the product listing.
#[instrument(skip(state, visitor), fields(currency = %visitor.currency))]
pub async fn home(State(state): State<AppState>, visitor: Visitor) -> Result<HomeTemplate> {
    let page = PageContext::load(&state, &visitor).await?;
    let catalog = state.services().catalog.list_products().await?;

    let mut products = Vec::with_capacity(catalog.len());
    for product in &catalog {
        products.push(product_view(&state, product, &visitor.currency).await?);
    }

    Ok(HomeTemplate {
        page,
        products,
        ad: choose_ad(&state, &[]).await,
    })
}
