//! Checkout request and result records.

use serde::{Deserialize, Serialize};

use super::catalog::CartItem;
use super::email::Email;
use super::id::{OrderId, SessionId, TrackingId};
use super::money::{CurrencyCode, Money};

/// A postal address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub street_address: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub zip_code: u32,
}

/// Payment card details collected at checkout.
///
/// `Debug` is implemented manually so card numbers never reach the logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditCardInfo {
    pub number: String,
    pub cvv: u32,
    pub expiration_year: u32,
    pub expiration_month: u32,
}

impl CreditCardInfo {
    /// Last four digits of the card number, for display.
    #[must_use]
    pub fn last_four(&self) -> &str {
        let len = self.number.len();
        self.number.get(len.saturating_sub(4)..).unwrap_or_default()
    }
}

impl core::fmt::Debug for CreditCardInfo {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CreditCardInfo")
            .field("number", &format_args!("****{}", self.last_four()))
            .field("cvv", &"[REDACTED]")
            .field("expiration_year", &self.expiration_year)
            .field("expiration_month", &self.expiration_month)
            .finish()
    }
}

/// Everything the checkout service needs to place an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrderRequest {
    pub user_id: SessionId,
    pub user_currency: CurrencyCode,
    pub address: Address,
    pub email: Email,
    pub credit_card: CreditCardInfo,
}

/// A line of a placed order, priced in the user's currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub item: CartItem,
    pub cost: Money,
}

/// Outcome of a successful checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderResult {
    pub order_id: OrderId,
    pub shipping_tracking_id: TrackingId,
    pub shipping_cost: Money,
    pub shipping_address: Address,
    pub items: Vec<OrderItem>,
}
