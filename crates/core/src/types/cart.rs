//! Cart line and wishlist entry types.
//!
//! Both are keyed by product: a store never holds two entries for the same
//! [`ProductId`]. The serialized form is what anonymous visitors keep in
//! local storage, so field names are stable camelCase.

use core::fmt;
use core::num::NonZeroU32;

use serde::{Deserialize, Serialize};

use super::{CartLineId, Price, ProductId, ProductSnapshot, UserId, WishlistEntryId};

/// Quantity of zero was supplied where a positive count is required.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("quantity must be at least 1")]
pub struct QuantityError;

/// A positive line quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Quantity(NonZeroU32);

impl Quantity {
    /// A single unit.
    pub const ONE: Self = Self(NonZeroU32::MIN);

    /// Create a quantity.
    ///
    /// # Errors
    ///
    /// Returns [`QuantityError`] for zero.
    pub fn new(value: u32) -> Result<Self, QuantityError> {
        NonZeroU32::new(value).map(Self).ok_or(QuantityError)
    }

    #[must_use]
    pub const fn get(self) -> u32 {
        self.0.get()
    }
}

impl TryFrom<u32> for Quantity {
    type Error = QuantityError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quantity> for u32 {
    fn from(q: Quantity) -> Self {
        q.get()
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Quantity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let n = s.trim().parse::<u32>().map_err(|e| e.to_string())?;
        Self::new(n).map_err(|e| e.to_string())
    }
}

/// One product in a cart.
///
/// `user_id` is `None` for lines that only exist in an anonymous visitor's
/// local storage; such lines carry a locally assigned id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub id: CartLineId,
    #[serde(default)]
    pub user_id: Option<UserId>,
    pub product_id: ProductId,
    pub product: ProductSnapshot,
    pub quantity: Quantity,
}

impl CartLine {
    /// Unit price times quantity, or `None` on overflow.
    #[must_use]
    pub fn line_total(&self) -> Option<Price> {
        self.product.price.times(self.quantity.get())
    }
}

/// One product on a wishlist. Membership only, no quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistEntry {
    pub id: WishlistEntryId,
    #[serde(default)]
    pub user_id: Option<UserId>,
    pub product_id: ProductId,
    pub product: ProductSnapshot,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn line() -> CartLine {
        CartLine {
            id: CartLineId::new(11),
            user_id: Some(UserId::new(42)),
            product_id: ProductId::new(3),
            product: ProductSnapshot {
                name: "Trek FX 2".to_string(),
                price: Price::new(12_500_000),
            },
            quantity: Quantity::new(2).unwrap(),
        }
    }

    #[test]
    fn test_quantity_rejects_zero() {
        assert_eq!(Quantity::new(0), Err(QuantityError));
        assert!(serde_json::from_str::<Quantity>("0").is_err());
        assert_eq!("3".parse::<Quantity>().unwrap().get(), 3);
    }

    #[test]
    fn test_line_total() {
        assert_eq!(line().line_total(), Some(Price::new(25_000_000)));
    }

    #[test]
    fn test_cart_line_json_shape() {
        let value = serde_json::to_value(line()).unwrap();
        assert_eq!(value["productId"], 3);
        assert_eq!(value["userId"], 42);
        assert_eq!(value["quantity"], 2);
        assert_eq!(value["product"]["price"], 12_500_000);
    }

    #[test]
    fn test_cart_line_without_user_id_deserializes() {
        let json = r#"{"id":1,"productId":7,"product":{"name":"Giant Escape","price":1000000},"quantity":1}"#;
        let parsed: CartLine = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.user_id, None);
        assert_eq!(parsed.product_id, ProductId::new(7));
    }
}
