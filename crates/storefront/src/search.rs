//! Search-as-you-type over the product catalog.
//!
//! Keystrokes go through [`ProductSearch::set_keyword`]. Each call bumps a
//! generation counter and schedules a request after the debounce window;
//! a request only fires if no newer keystroke arrived in the meantime, and a
//! response is only applied if it still belongs to the latest generation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};

use tracing::{debug, error, instrument};

use bikeshop_core::Product;

use crate::config::SearchConfig;
use crate::error::StoreError;
use crate::ports::CatalogBackend;

/// Snapshot of the current search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResults {
    /// Trimmed keyword the results belong to.
    pub keyword: String,
    /// All pages loaded so far, in order.
    pub products: Vec<Product>,
    /// Last loaded page, zero-based.
    pub page: u32,
    pub total_pages: u32,
    pub has_more: bool,
    pub loading: bool,
}

/// Debounced product search handle.
#[derive(Clone)]
pub struct ProductSearch {
    inner: Arc<ProductSearchInner>,
}

struct ProductSearchInner {
    backend: Arc<dyn CatalogBackend>,
    config: SearchConfig,
    generation: AtomicU64,
    results: RwLock<SearchResults>,
}

impl ProductSearch {
    #[must_use]
    pub fn new(backend: Arc<dyn CatalogBackend>, config: SearchConfig) -> Self {
        Self {
            inner: Arc::new(ProductSearchInner {
                backend,
                config,
                generation: AtomicU64::new(0),
                results: RwLock::new(SearchResults::default()),
            }),
        }
    }

    #[must_use]
    pub fn results(&self) -> SearchResults {
        self.inner
            .results
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Record a keystroke.
    ///
    /// A blank keyword clears the results immediately. Otherwise the first
    /// page is requested once the keyword has been unchanged for the
    /// debounce window. Must be called from within a Tokio runtime.
    pub fn set_keyword(&self, keyword: &str) {
        let generation = self.bump();
        let keyword = keyword.trim().to_string();

        if keyword.is_empty() {
            *self.write_results() = SearchResults::default();
            return;
        }

        let this = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(this.inner.config.debounce).await;
            if this.current() != generation {
                return;
            }
            // Failures are logged inside fetch_page
            let _ = this.fetch_page(generation, keyword, 0).await;
        });
    }

    /// Search for `keyword` right away, skipping the debounce.
    ///
    /// # Errors
    ///
    /// Returns the backend error; the results are cleared.
    pub async fn search_now(&self, keyword: &str) -> Result<SearchResults, StoreError> {
        let generation = self.bump();
        let keyword = keyword.trim().to_string();
        if keyword.is_empty() {
            *self.write_results() = SearchResults::default();
            return Ok(SearchResults::default());
        }
        self.fetch_page(generation, keyword, 0).await?;
        Ok(self.results())
    }

    /// Append the next page of the current search.
    ///
    /// No-op when there is no further page or a request is already running.
    ///
    /// # Errors
    ///
    /// Returns the backend error; the results are cleared.
    pub async fn load_more(&self) -> Result<(), StoreError> {
        let Some((keyword, next_page)) = self.read_for_more() else {
            return Ok(());
        };
        let generation = self.current();
        self.fetch_page(generation, keyword, next_page).await
    }

    fn read_for_more(&self) -> Option<(String, u32)> {
        let results = self
            .inner
            .results
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        if results.keyword.is_empty() || !results.has_more || results.loading {
            return None;
        }
        Some((results.keyword.clone(), results.page.saturating_add(1)))
    }

    fn bump(&self) -> u64 {
        self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn current(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    fn write_results(&self) -> RwLockWriteGuard<'_, SearchResults> {
        self.inner
            .results
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    #[instrument(skip(self, generation))]
    async fn fetch_page(
        &self,
        generation: u64,
        keyword: String,
        page: u32,
    ) -> Result<(), StoreError> {
        {
            let mut results = self.write_results();
            if page == 0 {
                *results = SearchResults {
                    keyword: keyword.clone(),
                    ..SearchResults::default()
                };
            }
            results.loading = true;
        }

        let response = self
            .inner
            .backend
            .search_products(&keyword, page, self.inner.config.page_size)
            .await;

        if self.current() != generation {
            debug!("Discarding stale search response");
            return Ok(());
        }

        let mut results = self.write_results();
        match response {
            Ok(found) => {
                debug!(count = found.products.len(), page = found.page, "Search page loaded");
                results.has_more = found.has_more();
                results.page = found.page;
                results.total_pages = found.total_pages;
                results.products.extend(found.products);
                results.loading = false;
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Product search failed");
                *results = SearchResults {
                    keyword,
                    ..SearchResults::default()
                };
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::api::{ApiError, ProductPage};
    use crate::ports::MockCatalogBackend;
    use crate::test_support::product;

    fn page(ids: &[i64], page: u32, total_pages: u32) -> ProductPage {
        ProductPage {
            products: ids.iter().map(|id| product(*id, 1_000)).collect(),
            page,
            total_pages,
        }
    }

    fn search(backend: MockCatalogBackend) -> ProductSearch {
        ProductSearch::new(Arc::new(backend), SearchConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_settled_keyword_is_searched() {
        let mut backend = MockCatalogBackend::new();
        backend
            .expect_search_products()
            .withf(|keyword, page, size| keyword == "giant" && *page == 0 && *size == 9)
            .times(1)
            .returning(|_, _, _| Ok(page(&[1, 2], 0, 1)));
        let search = search(backend);

        for partial in ["g", "gi", "gia", "gian", "giant"] {
            search.set_keyword(partial);
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(search.results().products.is_empty());

        tokio::time::sleep(Duration::from_millis(250)).await;

        let results = search.results();
        assert_eq!(results.keyword, "giant");
        assert_eq!(results.products.len(), 2);
        assert!(!results.has_more);
        assert!(!results.loading);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_keyword_clears_without_request() {
        let mut backend = MockCatalogBackend::new();
        backend
            .expect_search_products()
            .times(1)
            .returning(|_, _, _| Ok(page(&[1], 0, 1)));
        let search = search(backend);

        search.set_keyword("trek");
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(search.results().products.len(), 1);

        search.set_keyword("   ");
        assert_eq!(search.results(), SearchResults::default());
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(search.results(), SearchResults::default());
    }

    #[tokio::test]
    async fn test_load_more_appends_pages() {
        let mut backend = MockCatalogBackend::new();
        backend
            .expect_search_products()
            .withf(|_, page, _| *page == 0)
            .returning(|_, _, _| Ok(page(&[1, 2], 0, 2)));
        backend
            .expect_search_products()
            .withf(|_, page, _| *page == 1)
            .times(1)
            .returning(|_, _, _| Ok(page(&[3], 1, 2)));
        let search = search(backend);

        let first = search.search_now("bike").await.unwrap();
        assert!(first.has_more);

        search.load_more().await.unwrap();
        let results = search.results();
        let ids: Vec<i64> = results.products.iter().map(|p| p.id.as_i64()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(!results.has_more);

        // Last page reached: nothing more is requested
        search.load_more().await.unwrap();
        assert_eq!(search.results().products.len(), 3);
    }

    #[tokio::test]
    async fn test_failure_clears_results() {
        let mut backend = MockCatalogBackend::new();
        backend
            .expect_search_products()
            .returning(|_, _, _| Err(ApiError::Status { status: 503, message: String::new() }));
        let search = search(backend);

        assert!(search.search_now("bike").await.is_err());
        let results = search.results();
        assert!(results.products.is_empty());
        assert!(!results.loading);
    }
}
