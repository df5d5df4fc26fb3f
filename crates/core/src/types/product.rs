//! Catalog product types.
//!
//! Products are read-only on the client; they are produced by the backend
//! client's conversions and never mutated here.

use serde::{Deserialize, Serialize};

use super::{Price, ProductId};

/// A named specification value (frame size, wheel diameter, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductAttribute {
    pub name: String,
    pub value: String,
}

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Price,
    pub image_urls: Vec<String>,
    pub category: String,
    pub brand: String,
    pub colors: Vec<String>,
    /// Units in stock.
    pub stock: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<ProductAttribute>,
}

impl Product {
    /// The denormalized copy stored on cart and wishlist entries.
    #[must_use]
    pub fn snapshot(&self) -> ProductSnapshot {
        ProductSnapshot {
            name: self.name.clone(),
            price: self.price,
        }
    }

    /// First image, if any.
    #[must_use]
    pub fn primary_image(&self) -> Option<&str> {
        self.image_urls.first().map(String::as_str)
    }

    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.stock > 0
    }
}

/// Product fields copied onto a cart line or wishlist entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSnapshot {
    pub name: String,
    pub price: Price,
}
