//! Newtype IDs for type-safe entity references.
//!
//! Use the `define_id!` macro to create type-safe ID wrappers that prevent
//! accidentally mixing IDs from different entity types. Boutique identifiers
//! are opaque strings issued by the downstream services (product SKUs, order
//! numbers) or minted by the frontend (session ids).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Macro to define a type-safe string ID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`
/// - Conversion methods: `new()`, `as_str()`, `into_inner()`
/// - `Display`, `AsRef<str>` and `From<String>`/`From<&str>` implementations
///
/// # Example
///
/// ```rust
/// # use boutique_core::define_id;
/// define_id!(SkuId);
/// define_id!(TicketId);
///
/// let sku = SkuId::new("OLJCESPC7Z");
/// let ticket = TicketId::new("OLJCESPC7Z");
///
/// // These are different types, so this won't compile:
/// // let _: SkuId = ticket;
/// assert_eq!(sku.as_str(), ticket.as_str());
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new ID from any string-like value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the underlying string value.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the ID and return the inner string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl ::core::convert::AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

// Define standard entity IDs
define_id!(ProductId);
define_id!(OrderId);
define_id!(TrackingId);

/// Opaque per-visitor session identifier.
///
/// Minted by the frontend for first-time visitors and carried in the
/// `shop_session-id` cookie afterwards. The cart service keys carts by it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Mint a fresh, globally unique session identifier (UUID v4).
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Accept a session identifier presented by a client.
    ///
    /// Returns `None` for blank values so callers mint a new one instead.
    #[must_use]
    pub fn from_cookie_value(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_owned()))
        }
    }

    /// Get the underlying string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for SessionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_session_ids_are_unique() {
        let a = SessionId::generate();
        let b = SessionId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }

    #[test]
    fn test_blank_cookie_value_is_rejected() {
        assert!(SessionId::from_cookie_value("").is_none());
        assert!(SessionId::from_cookie_value("   ").is_none());
        assert_eq!(
            SessionId::from_cookie_value(" abc ").map(|id| id.to_string()),
            Some("abc".to_string())
        );
    }

    #[test]
    fn test_product_id_display_and_conversions() {
        let id = ProductId::new("66VCHSJNUP");
        assert_eq!(id.to_string(), "66VCHSJNUP");
        assert_eq!(String::from(id.clone()), "66VCHSJNUP");
        assert_eq!(ProductId::from("66VCHSJNUP"), id);
    }
}
