//! Fixtures shared by unit tests.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Notify;

use bikeshop_core::{
    CartLine, CartLineId, Price, Product, ProductId, Quantity, SessionState, UserId, UserProfile,
    UserRole, WishlistEntry, WishlistEntryId,
};

use crate::api::ApiError;
use crate::ports::{CartBackend, WishlistBackend};
use crate::session::Session;
use crate::storage::LocalStorage;

pub fn user(id: i64) -> UserProfile {
    UserProfile {
        id: UserId::new(id),
        username: format!("user{id}"),
        full_name: None,
        email: None,
        phone: None,
        address: None,
        gender: None,
        birth_date: None,
        role: UserRole::User,
    }
}

pub fn product(id: i64, price: u64) -> Product {
    Product {
        id: ProductId::new(id),
        name: format!("Bike {id}"),
        description: String::new(),
        price: Price::new(price),
        image_urls: Vec::new(),
        category: "road".to_string(),
        brand: "Giant".to_string(),
        colors: Vec::new(),
        stock: 5,
        attributes: Vec::new(),
    }
}

/// A backend cart line for `product` owned by `user_id`.
pub fn remote_line(line_id: i64, user_id: i64, product: &Product, quantity: u32) -> CartLine {
    CartLine {
        id: CartLineId::new(line_id),
        user_id: Some(UserId::new(user_id)),
        product_id: product.id,
        product: product.snapshot(),
        quantity: Quantity::new(quantity).unwrap_or(Quantity::ONE),
    }
}

pub fn authenticated(user_id: i64, storage: Arc<dyn LocalStorage>) -> Session {
    Session::fixed(SessionState::Authenticated(user(user_id)), storage)
}

pub fn anonymous(storage: Arc<dyn LocalStorage>) -> Session {
    Session::fixed(SessionState::Anonymous, storage)
}

pub fn unresolved(storage: Arc<dyn LocalStorage>) -> Session {
    Session::fixed(SessionState::Unresolved, storage)
}

/// A backend wishlist entry for `product` owned by `user_id`.
pub fn remote_entry(entry_id: i64, user_id: i64, product: &Product) -> WishlistEntry {
    WishlistEntry {
        id: WishlistEntryId::new(entry_id),
        user_id: Some(UserId::new(user_id)),
        product_id: product.id,
        product: product.snapshot(),
    }
}

/// Cart and wishlist backend whose fetches park until released.
///
/// Each fetch signals `entered`, then waits on `release`. Writes succeed
/// immediately.
pub struct GatedBackend {
    pub entered: Notify,
    pub release: Notify,
    cart: Vec<CartLine>,
    wishlist: Vec<WishlistEntry>,
}

impl GatedBackend {
    pub fn new(cart: Vec<CartLine>, wishlist: Vec<WishlistEntry>) -> Self {
        Self {
            entered: Notify::new(),
            release: Notify::new(),
            cart,
            wishlist,
        }
    }

    async fn gate(&self) {
        self.entered.notify_one();
        self.release.notified().await;
    }
}

#[async_trait]
impl CartBackend for GatedBackend {
    async fn fetch_cart(&self, _user_id: UserId) -> Result<Vec<CartLine>, ApiError> {
        self.gate().await;
        Ok(self.cart.clone())
    }

    async fn add_cart_line(
        &self,
        _user_id: UserId,
        _product_id: ProductId,
        _quantity: Quantity,
    ) -> Result<(), ApiError> {
        Ok(())
    }

    async fn delete_cart_line(&self, _line_id: CartLineId) -> Result<(), ApiError> {
        Ok(())
    }

    async fn update_cart_line(
        &self,
        _line_id: CartLineId,
        _quantity: Quantity,
    ) -> Result<(), ApiError> {
        Ok(())
    }

    async fn clear_cart(&self, _user_id: UserId) -> Result<(), ApiError> {
        Ok(())
    }
}

#[async_trait]
impl WishlistBackend for GatedBackend {
    async fn fetch_wishlist(&self, _user_id: UserId) -> Result<Vec<WishlistEntry>, ApiError> {
        self.gate().await;
        Ok(self.wishlist.clone())
    }

    async fn add_wishlist_entry(
        &self,
        _user_id: UserId,
        _product_id: ProductId,
    ) -> Result<(), ApiError> {
        Ok(())
    }

    async fn delete_wishlist_entry(&self, _entry_id: WishlistEntryId) -> Result<(), ApiError> {
        Ok(())
    }
}
