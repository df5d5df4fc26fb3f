//! Bikeshop storefront client state.
//!
//! Keeps the visitor's cart and wishlist in step with whoever the session
//! says they are: local storage while anonymous, the REST backend once
//! signed in. Also carries session resolution, debounced product search and
//! the admin dashboard preference.
//!
//! Start from [`ClientState`]:
//!
//! ```rust,ignore
//! let state = ClientState::new(StorefrontConfig::from_env()?)?;
//! state.resolve_session().await?;
//! state.cart().toggle(&product).await?;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cart;
pub mod config;
pub mod error;
mod mirror;
pub mod ports;
pub mod preferences;
pub mod search;
pub mod session;
pub mod state;
pub mod storage;
pub mod wishlist;

#[cfg(test)]
mod test_support;

pub use cart::CartStore;
pub use config::StorefrontConfig;
pub use error::StoreError;
pub use search::{ProductSearch, SearchResults};
pub use session::Session;
pub use state::{Backends, ClientState};
pub use wishlist::WishlistStore;
