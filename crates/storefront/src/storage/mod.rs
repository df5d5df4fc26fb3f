//! Durable key/value storage for anonymous state and session tokens.
//!
//! Values are strings; structured values go through [`load_json`] and
//! [`save_json`]. Two implementations ship with the crate:
//! [`FileStorage`] (one file per key) and [`MemoryStorage`] (tests and
//! ephemeral runs).

mod file;
mod memory;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

pub use file::FileStorage;
pub use memory::MemoryStorage;

/// Storage keys.
pub mod keys {
    /// Anonymous cart lines.
    pub const CART: &str = "cart";

    /// Anonymous wishlist entries.
    pub const WISHLIST: &str = "wishlist";

    /// Last resolved user profile.
    pub const USER: &str = "user";

    /// Session cookie header exported from the HTTP client.
    pub const TOKEN: &str = "token";

    /// Active admin dashboard section.
    pub const DASHBOARD_ACTIVE_ITEM: &str = "dashboardActiveItem";
}

/// Errors from local storage.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid storage key: {0:?}")]
    InvalidKey(String),

    /// The stored value under `key` is not valid JSON for its type.
    #[error("Corrupt value under {key:?}: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize value: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// A synchronous string key/value store.
pub trait LocalStorage: Send + Sync {
    /// Read the value under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete `key`. Deleting a missing key succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Read and deserialize the JSON value under `key`.
///
/// # Errors
///
/// Returns [`StorageError::Corrupt`] if the stored text does not parse.
pub fn load_json<T: DeserializeOwned>(
    storage: &dyn LocalStorage,
    key: &str,
) -> Result<Option<T>, StorageError> {
    let Some(raw) = storage.get(key)? else {
        return Ok(None);
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|source| StorageError::Corrupt {
            key: key.to_string(),
            source,
        })
}

/// Serialize `value` as JSON and write it under `key`.
///
/// # Errors
///
/// Returns an error if serialization or the write fails.
pub fn save_json<T: Serialize + ?Sized>(
    storage: &dyn LocalStorage,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    let raw = serde_json::to_string(value).map_err(StorageError::Serialize)?;
    storage.set(key, &raw)
}
