//! Catalog, cart, and advertising records.

use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::money::Money;

/// A product as served by the catalog service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    /// Relative URL of the product picture (served from `/static/`).
    pub picture: String,
    /// Base price; the catalog always quotes in USD.
    pub price_usd: Money,
    /// Free-form category tags, also used as ad context keys.
    #[serde(default)]
    pub categories: Vec<String>,
}

/// A line in a visitor's cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl CartItem {
    /// Create a new cart line.
    #[must_use]
    pub const fn new(product_id: ProductId, quantity: u32) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

/// A text advertisement returned by the ad service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ad {
    pub redirect_url: String,
    pub text: String,
}
