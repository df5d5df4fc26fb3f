//! REST client for the bikeshop backend.
//!
//! # Architecture
//!
//! - `reqwest` with a shared cookie jar; the backend's session is cookie based
//! - The backend is source of truth - no caching, every call goes over the wire
//! - Responses are read into `types` DTOs and validated by `conversions`
//!   before anything else in the crate sees them
//!
//! # Example
//!
//! ```rust,ignore
//! use bikeshop_storefront::api::BackendClient;
//! use bikeshop_storefront::ports::CartBackend;
//!
//! let client = BackendClient::new(&config.api_url)?;
//! let lines = client.fetch_cart(UserId::new(42)).await?;
//! ```

mod conversions;
mod types;

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::cookie::{CookieStore, Jar};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

use bikeshop_core::{
    CartLine, CartLineId, Price, Product, ProductId, Quantity, UserId, UserProfile,
    WishlistEntry, WishlistEntryId,
};

use crate::ports::{CartBackend, CatalogBackend, SessionBackend, WishlistBackend};

use conversions::{
    convert_cart, convert_product, convert_product_page, convert_user, convert_wishlist,
};
use types::{
    AddCartLineRequest, AddWishlistEntryRequest, FilterQuery, LineItemsWire, LoginRequest,
    LoginResponseWire, PageQuery, PageWire, ProductWire, SearchQuery, UserWire,
};

/// Errors that can occur when talking to the backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport-level failure (connect, TLS, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered 401.
    #[error("Unauthorized")]
    Unauthorized,

    /// The backend answered 404.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Any other non-success status.
    #[error("API error: {status} - {message}")]
    Status { status: u16, message: String },

    /// Body was not valid JSON for the expected shape.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Body parsed but failed validation.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Endpoint URL could not be built.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Result of a successful login.
#[derive(Debug)]
pub struct LoginOutcome {
    pub user: UserProfile,
    /// Token returned in the login body, when the backend sends one.
    pub token: Option<SecretString>,
}

/// One page of catalog products.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProductPage {
    pub products: Vec<Product>,
    /// Zero-based page number.
    pub page: u32,
    pub total_pages: u32,
}

impl ProductPage {
    /// Whether a later page exists.
    #[must_use]
    pub const fn has_more(&self) -> bool {
        self.page.saturating_add(1) < self.total_pages
    }
}

/// Catalog browsing criteria. `None` means "any".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProductFilter {
    pub category: Option<String>,
    pub brand: Option<String>,
    pub min_price: Option<Price>,
    pub max_price: Option<Price>,
}

impl ProductFilter {
    /// Nothing to filter on: the whole catalog.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.category.is_none()
            && self.brand.is_none()
            && self.min_price.is_none()
            && self.max_price.is_none()
    }

    /// The category, when it is the only criterion.
    #[must_use]
    pub fn category_only(&self) -> Option<&str> {
        if self.brand.is_none() && self.min_price.is_none() && self.max_price.is_none() {
            self.category.as_deref()
        } else {
            None
        }
    }
}

// =============================================================================
// BackendClient
// =============================================================================

/// HTTP client for the bikeshop backend.
///
/// Cheap to clone; clones share the connection pool and cookie jar.
#[derive(Clone)]
pub struct BackendClient {
    inner: Arc<BackendClientInner>,
}

struct BackendClientInner {
    client: reqwest::Client,
    base_url: Url,
    cookies: Arc<Jar>,
}

impl BackendClient {
    /// Create a client rooted at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(base_url: &Url) -> Result<Self, ApiError> {
        let mut base_url = base_url.clone();
        // Url::join replaces the last segment unless the path ends in '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let cookies = Arc::new(Jar::default());
        let client = reqwest::Client::builder()
            .cookie_provider(Arc::clone(&cookies))
            .build()?;

        Ok(Self {
            inner: Arc::new(BackendClientInner {
                client,
                base_url,
                cookies,
            }),
        })
    }

    /// The normalized base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.inner.base_url.join(path)?)
    }

    /// `api/all-products/category/{category}` with the category
    /// percent-encoded as one path segment.
    fn category_endpoint(&self, category: &str) -> Result<Url, ApiError> {
        let mut url = self.endpoint("api/all-products/category")?;
        url.path_segments_mut()
            .map_err(|()| ApiError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .push(category);
        Ok(url)
    }

    async fn read_page(request: reqwest::RequestBuilder) -> Result<ProductPage, ApiError> {
        let response = request.send().await?;
        let wire: PageWire<ProductWire> = Self::read_json(response).await?;
        Ok(convert_product_page(wire))
    }

    /// Map non-success statuses to errors.
    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        match status {
            StatusCode::UNAUTHORIZED => Err(ApiError::Unauthorized),
            StatusCode::NOT_FOUND => Err(ApiError::NotFound(response.url().path().to_string())),
            _ => {
                let message = response.text().await.unwrap_or_default();
                tracing::error!(
                    status = %status,
                    body = %message.chars().take(500).collect::<String>(),
                    "Backend returned non-success status"
                );
                Err(ApiError::Status {
                    status: status.as_u16(),
                    message: message.chars().take(200).collect(),
                })
            }
        }
    }

    /// Check status and parse the body as JSON.
    async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        let response = Self::check(response).await?;
        // Get response body as text first for better error diagnostics
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %text.chars().take(500).collect::<String>(),
                "Failed to parse backend response"
            );
            ApiError::Parse(e)
        })
    }

    async fn send_unit(request: reqwest::RequestBuilder) -> Result<(), ApiError> {
        let response = request.send().await?;
        Self::check(response).await?;
        Ok(())
    }
}

// =============================================================================
// Session
// =============================================================================

#[async_trait]
impl SessionBackend for BackendClient {
    #[instrument(skip(self))]
    async fn current_user(&self) -> Result<Option<UserProfile>, ApiError> {
        let response = self
            .inner
            .client
            .get(self.endpoint("api/users/me")?)
            .send()
            .await?;

        match Self::read_json::<UserWire>(response).await {
            Ok(wire) => convert_user(wire).map(Some),
            Err(ApiError::Unauthorized | ApiError::NotFound(_)) => {
                debug!("No active backend session");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self, password))]
    async fn login(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<LoginOutcome, ApiError> {
        let body = LoginRequest {
            username,
            password: password.expose_secret(),
        };
        let response = self
            .inner
            .client
            .post(self.endpoint("api/users/login")?)
            .json(&body)
            .send()
            .await?;

        let (user, token) = match Self::read_json::<LoginResponseWire>(response).await? {
            LoginResponseWire::Wrapped { user, token } => (user, token),
            LoginResponseWire::Bare(user) => (user, None),
        };

        Ok(LoginOutcome {
            user: convert_user(user)?,
            token: token.filter(|t| !t.is_empty()).map(SecretString::from),
        })
    }

    #[instrument(skip(self))]
    async fn logout(&self) -> Result<(), ApiError> {
        Self::send_unit(
            self.inner
                .client
                .post(self.endpoint("api/users/logout")?),
        )
        .await
    }

    fn export_credentials(&self) -> Option<SecretString> {
        let header = self.inner.cookies.cookies(&self.inner.base_url)?;
        header
            .to_str()
            .ok()
            .filter(|s| !s.is_empty())
            .map(|s| SecretString::from(s.to_string()))
    }

    fn import_credentials(&self, credentials: &SecretString) {
        for pair in credentials
            .expose_secret()
            .split(';')
            .map(str::trim)
            .filter(|p| !p.is_empty())
        {
            self.inner.cookies.add_cookie_str(pair, &self.inner.base_url);
        }
    }
}

// =============================================================================
// Cart
// =============================================================================

#[async_trait]
impl CartBackend for BackendClient {
    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn fetch_cart(&self, user_id: UserId) -> Result<Vec<CartLine>, ApiError> {
        let response = self
            .inner
            .client
            .get(self.endpoint(&format!("api/cart/{user_id}"))?)
            .send()
            .await?;
        let wire: LineItemsWire = Self::read_json(response).await?;
        convert_cart(user_id, wire)
    }

    #[instrument(skip(self), fields(user_id = %user_id, product_id = %product_id))]
    async fn add_cart_line(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<(), ApiError> {
        let body = AddCartLineRequest {
            user_id: user_id.as_i64(),
            product_id: product_id.as_i64(),
            quantity: quantity.get(),
        };
        Self::send_unit(
            self.inner
                .client
                .post(self.endpoint("api/cart/add")?)
                .json(&body),
        )
        .await
    }

    #[instrument(skip(self), fields(line_id = %line_id))]
    async fn delete_cart_line(&self, line_id: CartLineId) -> Result<(), ApiError> {
        Self::send_unit(
            self.inner
                .client
                .delete(self.endpoint(&format!("api/cart/delete/{line_id}"))?),
        )
        .await
    }

    #[instrument(skip(self), fields(line_id = %line_id, quantity = %quantity))]
    async fn update_cart_line(
        &self,
        line_id: CartLineId,
        quantity: Quantity,
    ) -> Result<(), ApiError> {
        Self::send_unit(
            self.inner
                .client
                .put(self.endpoint(&format!("api/cart/update/{line_id}"))?)
                .query(&[("quantity", quantity.get())]),
        )
        .await
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn clear_cart(&self, user_id: UserId) -> Result<(), ApiError> {
        Self::send_unit(
            self.inner
                .client
                .delete(self.endpoint(&format!("api/cart/clear/{user_id}"))?),
        )
        .await
    }
}

// =============================================================================
// Wishlist
// =============================================================================

#[async_trait]
impl WishlistBackend for BackendClient {
    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn fetch_wishlist(&self, user_id: UserId) -> Result<Vec<WishlistEntry>, ApiError> {
        let response = self
            .inner
            .client
            .get(self.endpoint(&format!("api/wishlist/{user_id}"))?)
            .send()
            .await?;
        let wire: LineItemsWire = Self::read_json(response).await?;
        convert_wishlist(user_id, wire)
    }

    #[instrument(skip(self), fields(user_id = %user_id, product_id = %product_id))]
    async fn add_wishlist_entry(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<(), ApiError> {
        let body = AddWishlistEntryRequest {
            user_id: user_id.as_i64(),
            product_id: product_id.as_i64(),
        };
        Self::send_unit(
            self.inner
                .client
                .post(self.endpoint("api/wishlist/add")?)
                .json(&body),
        )
        .await
    }

    #[instrument(skip(self), fields(entry_id = %entry_id))]
    async fn delete_wishlist_entry(&self, entry_id: WishlistEntryId) -> Result<(), ApiError> {
        Self::send_unit(
            self.inner
                .client
                .delete(self.endpoint(&format!("api/wishlist/delete/{entry_id}"))?),
        )
        .await
    }
}

// =============================================================================
// Catalog
// =============================================================================

#[async_trait]
impl CatalogBackend for BackendClient {
    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn get_product(&self, product_id: ProductId) -> Result<Product, ApiError> {
        let response = self
            .inner
            .client
            .get(self.endpoint(&format!("api/all-products/{product_id}"))?)
            .send()
            .await?;
        let wire: ProductWire = Self::read_json(response).await?;
        convert_product(wire)
    }

    #[instrument(skip(self))]
    async fn list_products(&self, page: u32, size: u32) -> Result<ProductPage, ApiError> {
        Self::read_page(
            self.inner
                .client
                .get(self.endpoint("api/all-products")?)
                .query(&PageQuery { page, size }),
        )
        .await
    }

    #[instrument(skip(self))]
    async fn products_by_category(
        &self,
        category: &str,
        page: u32,
        size: u32,
    ) -> Result<ProductPage, ApiError> {
        Self::read_page(
            self.inner
                .client
                .get(self.category_endpoint(category)?)
                .query(&PageQuery { page, size }),
        )
        .await
    }

    #[instrument(skip(self))]
    async fn filter_products(
        &self,
        filter: &ProductFilter,
        page: u32,
        size: u32,
    ) -> Result<ProductPage, ApiError> {
        let query = FilterQuery {
            category: filter.category.as_deref(),
            brand: filter.brand.as_deref(),
            min_price: filter.min_price.map(|p| p.amount()),
            max_price: filter.max_price.map(|p| p.amount()),
            page,
            size,
        };
        Self::read_page(
            self.inner
                .client
                .get(self.endpoint("api/all-products/filter")?)
                .query(&query),
        )
        .await
    }

    #[instrument(skip(self))]
    async fn search_products(
        &self,
        keyword: &str,
        page: u32,
        size: u32,
    ) -> Result<ProductPage, ApiError> {
        Self::read_page(
            self.inner
                .client
                .get(self.endpoint("api/all-products/search")?)
                .query(&SearchQuery {
                    keyword,
                    page,
                    size,
                }),
        )
        .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display() {
        let err = ApiError::NotFound("/api/cart/42".to_string());
        assert_eq!(err.to_string(), "Not found: /api/cart/42");

        let err = ApiError::Status {
            status: 500,
            message: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "API error: 500 - boom");
    }

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let client = BackendClient::new(&Url::parse("https://api.bikeshop.vn/v1").unwrap()).unwrap();
        assert_eq!(client.base_url().as_str(), "https://api.bikeshop.vn/v1/");
        assert_eq!(
            client.endpoint("api/cart/42").unwrap().as_str(),
            "https://api.bikeshop.vn/v1/api/cart/42"
        );
    }

    #[test]
    fn test_credentials_round_trip_through_jar() {
        let url = Url::parse("http://localhost:8081").unwrap();
        let client = BackendClient::new(&url).unwrap();
        assert!(client.export_credentials().is_none());

        client.import_credentials(&SecretString::from("JSESSIONID=abc123; authToken=minh"));
        let exported = client.export_credentials().unwrap();
        let exported = exported.expose_secret();
        assert!(exported.contains("JSESSIONID=abc123"));
        assert!(exported.contains("authToken=minh"));
    }

    #[test]
    fn test_category_endpoint_encodes_segment() {
        let client = BackendClient::new(&Url::parse("http://localhost:8081").unwrap()).unwrap();
        assert_eq!(
            client.category_endpoint("city bikes/kids").unwrap().as_str(),
            "http://localhost:8081/api/all-products/category/city%20bikes%2Fkids"
        );
    }

    #[test]
    fn test_filter_shape() {
        assert!(ProductFilter::default().is_empty());

        let road = ProductFilter {
            category: Some("road".to_string()),
            ..ProductFilter::default()
        };
        assert!(!road.is_empty());
        assert_eq!(road.category_only(), Some("road"));

        let cheap_road = ProductFilter {
            max_price: Some(Price::new(10_000_000)),
            ..road
        };
        assert_eq!(cheap_road.category_only(), None);
    }

    #[test]
    fn test_filter_query_skips_unset_criteria() {
        let query = FilterQuery {
            category: None,
            brand: Some("Giant"),
            min_price: None,
            max_price: Some(10_000_000),
            page: 0,
            size: 9,
        };
        let json = serde_json::to_value(&query).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"brand": "Giant", "maxPrice": 10_000_000, "page": 0, "size": 9})
        );
    }

    #[test]
    fn test_product_page_has_more() {
        let page = ProductPage {
            products: vec![],
            page: 1,
            total_pages: 2,
        };
        assert!(!page.has_more());
        let page = ProductPage {
            page: 0,
            ..page
        };
        assert!(page.has_more());
    }
}
