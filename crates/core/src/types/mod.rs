//! Core types for the Bikeshop storefront.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod cart;
pub mod email;
pub mod id;
pub mod price;
pub mod product;
pub mod status;
pub mod user;

pub use cart::{CartLine, Quantity, QuantityError, WishlistEntry};
pub use email::{Email, EmailError};
pub use id::*;
pub use price::{Price, PriceError};
pub use product::{Product, ProductAttribute, ProductSnapshot};
pub use status::*;
pub use user::{SessionState, UserProfile};
