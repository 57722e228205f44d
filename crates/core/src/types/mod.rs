//! Core types for the boutique.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod catalog;
pub mod email;
pub mod id;
pub mod money;
pub mod order;

pub use catalog::{Ad, CartItem, Product};
pub use email::{Email, EmailError};
pub use id::*;
pub use money::{CurrencyCode, CurrencyCodeError, Money, MoneyError};
pub use order::{Address, CreditCardInfo, OrderItem, OrderResult, PlaceOrderRequest};
