//! Command implementations. Each writes human-readable output to `out`.

pub mod cart;
pub mod catalog;
pub mod dashboard;
pub mod session;
pub mod wishlist;
