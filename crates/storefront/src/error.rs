//! Errors returned by the cart, wishlist and session handles.

use thiserror::Error;

use bikeshop_core::CartLineId;

use crate::api::ApiError;
use crate::storage::StorageError;

/// Store-level error type.
///
/// Every variant leaves the store's in-memory state as it was before the
/// failing call, with one exception: a failed sync after a session change
/// empties the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The session has not been resolved yet; mutations are refused.
    #[error("Session not resolved yet")]
    SessionNotReady,

    /// No cart line with this id.
    #[error("Cart line not found: {0}")]
    LineNotFound(CartLineId),

    /// Backend call failed.
    #[error("Backend error: {0}")]
    Backend(#[from] ApiError),

    /// Local storage read or write failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl StoreError {
    /// Whether the backend rejected the session.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Backend(ApiError::Unauthorized))
    }
}
