//! Client state wiring.

use std::sync::Arc;

use secrecy::SecretString;
use tracing::instrument;

use bikeshop_core::{Product, ProductId, SessionState, UserProfile};

use crate::api::{BackendClient, ProductFilter, ProductPage};
use crate::cart::CartStore;
use crate::config::StorefrontConfig;
use crate::error::StoreError;
use crate::ports::{CartBackend, CatalogBackend, SessionBackend, WishlistBackend};
use crate::preferences::DashboardPreference;
use crate::search::ProductSearch;
use crate::session::Session;
use crate::storage::{FileStorage, LocalStorage};
use crate::wishlist::WishlistStore;

/// The backend ports a [`ClientState`] talks through.
#[derive(Clone)]
pub struct Backends {
    pub session: Arc<dyn SessionBackend>,
    pub cart: Arc<dyn CartBackend>,
    pub wishlist: Arc<dyn WishlistBackend>,
    pub catalog: Arc<dyn CatalogBackend>,
}

impl Backends {
    /// Route every port through one HTTP client.
    #[must_use]
    pub fn http(client: &BackendClient) -> Self {
        Self {
            session: Arc::new(client.clone()),
            cart: Arc::new(client.clone()),
            wishlist: Arc::new(client.clone()),
            catalog: Arc::new(client.clone()),
        }
    }
}

/// Everything a front end needs: session, cart, wishlist, search and
/// preferences over one storage and one backend.
///
/// Cheaply cloneable via `Arc`. Session transitions go through this type so
/// both stores are re-synced after each one.
#[derive(Clone)]
pub struct ClientState {
    inner: Arc<ClientStateInner>,
}

struct ClientStateInner {
    config: StorefrontConfig,
    catalog: Arc<dyn CatalogBackend>,
    session: Session,
    cart: CartStore,
    wishlist: WishlistStore,
    search: ProductSearch,
    dashboard: DashboardPreference,
}

impl ClientState {
    /// Build state over the HTTP backend and file storage from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage directory cannot be created or the
    /// HTTP client fails to build.
    pub fn new(config: StorefrontConfig) -> Result<Self, StoreError> {
        let storage = Arc::new(FileStorage::open(&config.storage_dir)?);
        Self::with_storage(config, storage)
    }

    /// Build state over the HTTP backend and the given storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn with_storage(
        config: StorefrontConfig,
        storage: Arc<dyn LocalStorage>,
    ) -> Result<Self, StoreError> {
        let client = BackendClient::new(&config.api_url)?;
        Ok(Self::from_parts(config, Backends::http(&client), storage))
    }

    /// Build state from explicit parts.
    #[must_use]
    pub fn from_parts(
        config: StorefrontConfig,
        backends: Backends,
        storage: Arc<dyn LocalStorage>,
    ) -> Self {
        let session = Session::new(backends.session, storage.clone());
        let cart = CartStore::new(backends.cart, session.clone(), storage.clone());
        let wishlist = WishlistStore::new(backends.wishlist, session.clone(), storage.clone());
        let search = ProductSearch::new(backends.catalog.clone(), config.search);
        let dashboard = DashboardPreference::new(storage);

        Self {
            inner: Arc::new(ClientStateInner {
                config,
                catalog: backends.catalog,
                session,
                cart,
                wishlist,
                search,
                dashboard,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    #[must_use]
    pub fn cart(&self) -> &CartStore {
        &self.inner.cart
    }

    #[must_use]
    pub fn wishlist(&self) -> &WishlistStore {
        &self.inner.wishlist
    }

    #[must_use]
    pub fn search(&self) -> &ProductSearch {
        &self.inner.search
    }

    #[must_use]
    pub fn dashboard(&self) -> &DashboardPreference {
        &self.inner.dashboard
    }

    /// Fetch one product from the catalog.
    ///
    /// # Errors
    ///
    /// Returns the backend error.
    pub async fn product(&self, product_id: ProductId) -> Result<Product, StoreError> {
        Ok(self.inner.catalog.get_product(product_id).await?)
    }

    /// Browse the catalog one page at a time, `page` being zero-based.
    ///
    /// An empty filter lists everything and a lone category uses the
    /// category listing. Anything else goes through the filter endpoint.
    ///
    /// # Errors
    ///
    /// Returns the backend error.
    #[instrument(skip(self))]
    pub async fn browse(
        &self,
        filter: &ProductFilter,
        page: u32,
    ) -> Result<ProductPage, StoreError> {
        let catalog = &self.inner.catalog;
        let size = self.inner.config.search.page_size;
        let result = if filter.is_empty() {
            catalog.list_products(page, size).await
        } else if let Some(category) = filter.category_only() {
            catalog.products_by_category(category, page, size).await
        } else {
            catalog.filter_products(filter, page, size).await
        };
        Ok(result?)
    }

    /// Resolve the session, then load both stores from the matching channel.
    ///
    /// # Errors
    ///
    /// Returns the first store sync error. The session is resolved either way.
    #[instrument(skip(self))]
    pub async fn resolve_session(&self) -> Result<SessionState, StoreError> {
        let state = self.inner.session.resolve().await;
        self.sync_stores().await?;
        Ok(state)
    }

    /// Log in, then reload both stores from the backend.
    ///
    /// # Errors
    ///
    /// Returns the login error, or the first store sync error.
    #[instrument(skip(self, password))]
    pub async fn login(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<UserProfile, StoreError> {
        let user = self.inner.session.login(username, password).await?;
        self.sync_stores().await?;
        Ok(user)
    }

    /// Log out, then reseed both stores from anonymous storage.
    ///
    /// # Errors
    ///
    /// Returns the backend logout error, or the first store sync error.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<(), StoreError> {
        let logout = self.inner.session.logout().await;
        let synced = self.sync_stores().await;
        logout.and(synced)
    }

    async fn sync_stores(&self) -> Result<(), StoreError> {
        let cart = self.inner.cart.sync_with_session().await;
        let wishlist = self.inner.wishlist.sync_with_session().await;
        cart.and(wishlist)
    }
}
