//! Bikeshop Core - Shared domain types.
//!
//! This crate provides the types used across the Bikeshop storefront client:
//! - `storefront` - Cart/wishlist stores, session and backend client
//! - `cli` - Terminal front end over the storefront library
//!
//! # Architecture
//!
//! The core crate contains only types and validation - no I/O, no storage,
//! no HTTP clients. Anything that crosses the network boundary is converted
//! into these types before the rest of the client sees it.
//!
//! # Modules
//!
//! - [`types`] - Newtype ids, prices, emails, products, cart lines and users

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
