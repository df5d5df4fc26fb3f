//! Wire types for the bikeshop REST backend.
//!
//! Every field the backend may omit or null is an `Option` here; the
//! `conversions` module decides which absences are fatal. Nothing outside
//! the `api` module sees these types.

use serde::{Deserialize, Serialize};

// =============================================================================
// Requests
// =============================================================================

/// Body of `POST /api/users/login`.
#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Body of `POST /api/cart/add`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCartLineRequest {
    pub user_id: i64,
    pub product_id: i64,
    pub quantity: u32,
}

/// Body of `POST /api/wishlist/add`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddWishlistEntryRequest {
    pub user_id: i64,
    pub product_id: i64,
}

/// Query of `GET /api/all-products/search`.
#[derive(Debug, Serialize)]
pub struct SearchQuery<'a> {
    pub keyword: &'a str,
    pub page: u32,
    pub size: u32,
}

/// Paging query of `GET /api/all-products` and the category listing.
#[derive(Debug, Serialize)]
pub struct PageQuery {
    pub page: u32,
    pub size: u32,
}

/// Query of `GET /api/all-products/filter`. Unset criteria are left out.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterQuery<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_price: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_price: Option<u64>,
    pub page: u32,
    pub size: u32,
}

// =============================================================================
// Responses
// =============================================================================

/// Response of `GET /api/cart/{userId}` and `GET /api/wishlist/{userId}`.
/// The wishlist also sends `userName`; the caller already knows who it asked
/// for, so it is left to serde to skip.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItemsWire {
    #[serde(default)]
    pub items: Option<Vec<LineItemWire>>,
}

/// One cart line or wishlist entry.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItemWire {
    pub id: Option<i64>,
    pub product_id: Option<i64>,
    pub product_name: Option<String>,
    pub price: Option<f64>,
    pub quantity: Option<i64>,
}

/// A user record. The backend serializes its entity directly, so the
/// password hash may be present; it is never deserialized.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserWire {
    pub id: Option<i64>,
    #[serde(alias = "userName")]
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub email: Option<String>,
    #[serde(alias = "phoneNumber")]
    pub phone: Option<String>,
    pub address: Option<String>,
    pub gender: Option<String>,
    #[serde(alias = "dob")]
    pub birth_date: Option<String>,
    pub role: Option<String>,
}

/// Login response: either the bare user or `{user, token}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum LoginResponseWire {
    Wrapped { user: UserWire, token: Option<String> },
    Bare(UserWire),
}

/// A catalog product.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductWire {
    #[serde(alias = "productId")]
    pub id: Option<i64>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    #[serde(default)]
    pub image_urls: Option<Vec<String>>,
    pub image_url: Option<String>,
    pub category: Option<String>,
    pub brand: Option<String>,
    #[serde(default)]
    pub color: Option<OneOrMany>,
    pub quantity: Option<i64>,
    #[serde(default)]
    pub attributes: Option<Vec<AttributeWire>>,
}

/// The product `color` column is a JSON list on the entity and a plain
/// string on some DTOs.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeWire {
    pub attribute_name: Option<String>,
    pub attribute_value: Option<String>,
}

/// A Spring Data page.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageWire<T> {
    #[serde(default = "Vec::new")]
    pub content: Vec<T>,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub number: u32,
}
