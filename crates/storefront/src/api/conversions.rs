//! Wire-to-domain conversion functions.
//!
//! Required fields that are missing or invalid reject the whole payload
//! with [`ApiError::InvalidPayload`]. Optional profile fields that fail
//! validation are dropped with a warning instead.

use chrono::NaiveDate;
use tracing::warn;

use bikeshop_core::{
    CartLine, CartLineId, Email, Price, Product, ProductAttribute, ProductId, ProductSnapshot,
    Quantity, UserId, UserProfile, UserRole, WishlistEntry, WishlistEntryId,
};

use crate::mirror::dedupe;

use super::ApiError;
use super::ProductPage;
use super::types::{LineItemWire, LineItemsWire, OneOrMany, PageWire, ProductWire, UserWire};

/// Birth dates are `dd-MM-yyyy` on the user entity; ISO dates are accepted too.
const BIRTH_DATE_FORMATS: &[&str] = &["%d-%m-%Y", "%Y-%m-%d"];

fn invalid(what: impl Into<String>) -> ApiError {
    ApiError::InvalidPayload(what.into())
}

fn snapshot(item: &LineItemWire, index: usize) -> Result<ProductSnapshot, ApiError> {
    let price = item
        .price
        .ok_or_else(|| invalid(format!("items[{index}].price is missing")))?;
    let price = Price::from_wire(price)
        .map_err(|e| invalid(format!("items[{index}].price: {e}")))?;
    Ok(ProductSnapshot {
        name: item.product_name.clone().unwrap_or_default(),
        price,
    })
}

fn ids(item: &LineItemWire, index: usize) -> Result<(i64, ProductId), ApiError> {
    let id = item
        .id
        .ok_or_else(|| invalid(format!("items[{index}].id is missing")))?;
    let product_id = item
        .product_id
        .ok_or_else(|| invalid(format!("items[{index}].productId is missing")))?;
    Ok((id, ProductId::new(product_id)))
}

// =============================================================================
// Cart & Wishlist
// =============================================================================

pub fn convert_cart(user_id: UserId, wire: LineItemsWire) -> Result<Vec<CartLine>, ApiError> {
    let lines = wire
        .items
        .unwrap_or_default()
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let (id, product_id) = ids(item, index)?;
            let raw_quantity = item
                .quantity
                .ok_or_else(|| invalid(format!("items[{index}].quantity is missing")))?;
            let quantity = u32::try_from(raw_quantity)
                .ok()
                .and_then(|q| Quantity::new(q).ok())
                .ok_or_else(|| {
                    invalid(format!("items[{index}].quantity must be positive (got {raw_quantity})"))
                })?;
            Ok(CartLine {
                id: CartLineId::new(id),
                user_id: Some(user_id),
                product_id,
                product: snapshot(item, index)?,
                quantity,
            })
        })
        .collect::<Result<Vec<_>, ApiError>>()?;

    Ok(dedupe(lines, |line| line.product_id))
}

pub fn convert_wishlist(
    user_id: UserId,
    wire: LineItemsWire,
) -> Result<Vec<WishlistEntry>, ApiError> {
    let entries = wire
        .items
        .unwrap_or_default()
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let (id, product_id) = ids(item, index)?;
            Ok(WishlistEntry {
                id: WishlistEntryId::new(id),
                user_id: Some(user_id),
                product_id,
                product: snapshot(item, index)?,
            })
        })
        .collect::<Result<Vec<_>, ApiError>>()?;

    Ok(dedupe(entries, |entry| entry.product_id))
}

// =============================================================================
// Users
// =============================================================================

fn parse_birth_date(raw: &str) -> Option<NaiveDate> {
    BIRTH_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw.trim(), fmt).ok())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

pub fn convert_user(wire: UserWire) -> Result<UserProfile, ApiError> {
    let id = wire.id.ok_or_else(|| invalid("user.id is missing"))?;
    let username = non_blank(wire.username).ok_or_else(|| invalid("user.username is missing"))?;

    let email = non_blank(wire.email).and_then(|raw| match Email::parse(&raw) {
        Ok(email) => Some(email),
        Err(e) => {
            warn!(user_id = id, error = %e, "Dropping invalid email on user profile");
            None
        }
    });

    let birth_date = non_blank(wire.birth_date).and_then(|raw| {
        let parsed = parse_birth_date(&raw);
        if parsed.is_none() {
            warn!(user_id = id, value = %raw, "Dropping unparseable birth date on user profile");
        }
        parsed
    });

    Ok(UserProfile {
        id: UserId::new(id),
        username,
        full_name: non_blank(wire.full_name),
        email,
        phone: non_blank(wire.phone),
        address: non_blank(wire.address),
        gender: non_blank(wire.gender),
        birth_date,
        role: UserRole::from_wire(wire.role.as_deref()),
    })
}

// =============================================================================
// Products
// =============================================================================

pub fn convert_product(wire: ProductWire) -> Result<Product, ApiError> {
    let id = wire.id.ok_or_else(|| invalid("product.id is missing"))?;
    let name = non_blank(wire.name)
        .ok_or_else(|| invalid(format!("product {id} has no name")))?;
    let price = wire
        .price
        .ok_or_else(|| invalid(format!("product {id} has no price")))
        .and_then(|p| Price::from_wire(p).map_err(|e| invalid(format!("product {id}: {e}"))))?;

    let mut image_urls = wire.image_urls.unwrap_or_default();
    if image_urls.is_empty()
        && let Some(url) = non_blank(wire.image_url)
    {
        image_urls.push(url);
    }

    let colors = match wire.color {
        Some(OneOrMany::One(c)) => non_blank(Some(c)).into_iter().collect(),
        Some(OneOrMany::Many(cs)) => cs,
        None => Vec::new(),
    };

    // Negative stock is clamped to zero.
    let stock = wire
        .quantity
        .map_or(0, |q| u32::try_from(q.max(0)).unwrap_or(u32::MAX));

    let attributes = wire
        .attributes
        .unwrap_or_default()
        .into_iter()
        .filter_map(|a| {
            Some(ProductAttribute {
                name: non_blank(a.attribute_name)?,
                value: a.attribute_value.unwrap_or_default(),
            })
        })
        .collect();

    Ok(Product {
        id: ProductId::new(id),
        name,
        description: wire.description.unwrap_or_default(),
        price,
        image_urls,
        category: wire.category.unwrap_or_default(),
        brand: wire.brand.unwrap_or_default(),
        colors,
        stock,
        attributes,
    })
}

/// Convert a listing, filter or search page. Malformed products are skipped
/// with a warning so one bad row does not blank the whole page.
pub fn convert_product_page(wire: PageWire<ProductWire>) -> ProductPage {
    let products = wire
        .content
        .into_iter()
        .filter_map(|p| match convert_product(p) {
            Ok(product) => Some(product),
            Err(e) => {
                warn!(error = %e, "Skipping malformed product in catalog page");
                None
            }
        })
        .collect();

    ProductPage {
        products,
        page: wire.number,
        total_pages: wire.total_pages,
    }
}
