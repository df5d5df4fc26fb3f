//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All optional:
//! - `BIKESHOP_API_URL` - Backend base URL (default: `http://localhost:8081`)
//! - `BIKESHOP_STORAGE_DIR` - Directory for durable local storage (default: `.bikeshop`)
//! - `BIKESHOP_SEARCH_DEBOUNCE_MS` - Quiet period before a search fires (default: 300)
//! - `BIKESHOP_SEARCH_PAGE_SIZE` - Products per search page (default: 9)
//! - `BIKESHOP_LOG_FORMAT` - `text` or `json` (default: text)

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

const DEFAULT_API_URL: &str = "http://localhost:8081";
const DEFAULT_STORAGE_DIR: &str = ".bikeshop";
const DEFAULT_DEBOUNCE_MS: &str = "300";
const DEFAULT_PAGE_SIZE: &str = "9";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Log output format for the subscriber installed by binaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Storefront client configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// Backend base URL; API paths are joined onto it
    pub api_url: Url,
    /// Directory holding one file per local storage key
    pub storage_dir: PathBuf,
    /// Product search tuning
    pub search: SearchConfig,
    /// Log output format
    pub log_format: LogFormat,
}

/// Search-as-you-type settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchConfig {
    /// How long the keyword must stay unchanged before a request is made
    pub debounce: Duration,
    /// Page size requested from the backend
    pub page_size: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(300),
            page_size: 9,
        }
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set but cannot be parsed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_url_raw = get_env_or_default(&lookup, "BIKESHOP_API_URL", DEFAULT_API_URL);
        let api_url = Url::parse(&api_url_raw).map_err(|e| {
            ConfigError::InvalidEnvVar("BIKESHOP_API_URL".to_string(), e.to_string())
        })?;
        if api_url.cannot_be_a_base() {
            return Err(ConfigError::InvalidEnvVar(
                "BIKESHOP_API_URL".to_string(),
                "must be an absolute http(s) URL".to_string(),
            ));
        }

        let storage_dir = PathBuf::from(get_env_or_default(
            &lookup,
            "BIKESHOP_STORAGE_DIR",
            DEFAULT_STORAGE_DIR,
        ));

        let debounce_ms = get_env_or_default(&lookup, "BIKESHOP_SEARCH_DEBOUNCE_MS", DEFAULT_DEBOUNCE_MS)
            .parse::<u64>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("BIKESHOP_SEARCH_DEBOUNCE_MS".to_string(), e.to_string())
            })?;
        let page_size = get_env_or_default(&lookup, "BIKESHOP_SEARCH_PAGE_SIZE", DEFAULT_PAGE_SIZE)
            .parse::<u32>()
            .map_err(|e| e.to_string())
            .and_then(|n| {
                if n == 0 {
                    Err("must be at least 1".to_string())
                } else {
                    Ok(n)
                }
            })
            .map_err(|e| ConfigError::InvalidEnvVar("BIKESHOP_SEARCH_PAGE_SIZE".to_string(), e))?;

        let log_format = match get_optional_env(&lookup, "BIKESHOP_LOG_FORMAT").as_deref() {
            None | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::InvalidEnvVar(
                    "BIKESHOP_LOG_FORMAT".to_string(),
                    format!("expected 'text' or 'json', got '{other}'"),
                ));
            }
        };

        Ok(Self {
            api_url,
            storage_dir,
            search: SearchConfig {
                debounce: Duration::from_millis(debounce_ms),
                page_size,
            },
            log_format,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get an optional variable, treating empty values as unset.
fn get_optional_env(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key).filter(|v| !v.trim().is_empty())
}

/// Get a variable with a default value.
fn get_env_or_default(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    get_optional_env(lookup, key).unwrap_or_else(|| default.to_string())
}
