//! Boutique Core - Shared domain types.
//!
//! This crate provides the types exchanged between the storefront frontend and
//! the seven downstream services it composes (catalog, currency, cart,
//! recommendation, checkout, shipping, ad).
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients, no service
//! traits. Service contracts live in the frontend crate next to the code that
//! resolves them.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, money, email addresses, and catalog/order records

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
