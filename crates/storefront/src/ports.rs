//! Backend ports used by the stores.
//!
//! [`BackendClient`](crate::api::BackendClient) implements every port over
//! HTTP. Stores hold them as `Arc<dyn ...>` so unit tests can substitute
//! mocks.

use async_trait::async_trait;
use secrecy::SecretString;

use bikeshop_core::{
    CartLine, CartLineId, Product, ProductId, Quantity, UserId, UserProfile, WishlistEntry,
    WishlistEntryId,
};

use crate::api::{ApiError, LoginOutcome, ProductFilter, ProductPage};

/// Session identity endpoints under `/api/users`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionBackend: Send + Sync {
    /// Resolve the current session. `Ok(None)` means anonymous.
    async fn current_user(&self) -> Result<Option<UserProfile>, ApiError>;

    /// Exchange credentials for a session.
    async fn login(&self, username: &str, password: &SecretString)
    -> Result<LoginOutcome, ApiError>;

    /// End the server-side session.
    async fn logout(&self) -> Result<(), ApiError>;

    /// Session credentials currently held by the transport, if any.
    fn export_credentials(&self) -> Option<SecretString>;

    /// Load previously exported credentials into the transport.
    fn import_credentials(&self, credentials: &SecretString);
}

/// Cart endpoints under `/api/cart`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CartBackend: Send + Sync {
    async fn fetch_cart(&self, user_id: UserId) -> Result<Vec<CartLine>, ApiError>;

    async fn add_cart_line(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<(), ApiError>;

    async fn delete_cart_line(&self, line_id: CartLineId) -> Result<(), ApiError>;

    async fn update_cart_line(&self, line_id: CartLineId, quantity: Quantity)
    -> Result<(), ApiError>;

    async fn clear_cart(&self, user_id: UserId) -> Result<(), ApiError>;
}

/// Wishlist endpoints under `/api/wishlist`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WishlistBackend: Send + Sync {
    async fn fetch_wishlist(&self, user_id: UserId) -> Result<Vec<WishlistEntry>, ApiError>;

    async fn add_wishlist_entry(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<(), ApiError>;

    async fn delete_wishlist_entry(&self, entry_id: WishlistEntryId) -> Result<(), ApiError>;
}

/// Read-only catalog endpoints under `/api/all-products`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogBackend: Send + Sync {
    async fn get_product(&self, product_id: ProductId) -> Result<Product, ApiError>;

    /// One page of the whole catalog.
    async fn list_products(&self, page: u32, size: u32) -> Result<ProductPage, ApiError>;

    async fn products_by_category(
        &self,
        category: &str,
        page: u32,
        size: u32,
    ) -> Result<ProductPage, ApiError>;

    async fn filter_products(
        &self,
        filter: &ProductFilter,
        page: u32,
        size: u32,
    ) -> Result<ProductPage, ApiError>;

    async fn search_products(
        &self,
        keyword: &str,
        page: u32,
        size: u32,
    ) -> Result<ProductPage, ApiError>;
}
