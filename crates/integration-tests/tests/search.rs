//! Product lookup, catalog browsing and search pagination.

#![allow(clippy::unwrap_used)]

use bikeshop_core::{Price, ProductId};
use bikeshop_integration_tests::FakeBackend;
use bikeshop_storefront::StoreError;
use bikeshop_storefront::api::ProductFilter;

fn ids(page: &bikeshop_storefront::api::ProductPage) -> Vec<i64> {
    page.products.iter().map(|p| p.id.as_i64()).collect()
}

#[tokio::test]
async fn test_product_detail() {
    let backend = FakeBackend::start().await;
    let dir = tempfile::tempdir().unwrap();
    let state = backend.client_state(dir.path());

    let product = state.product(ProductId::new(7)).await.unwrap();

    assert_eq!(product.name, "Giant Escape 3");
    assert_eq!(product.price, Price::new(1_000_000));
    assert_eq!(product.colors, vec!["Black", "Blue"]);
    assert_eq!(product.primary_image(), Some("/images/7.jpg"));
    assert!(product.in_stock());
}

#[tokio::test]
async fn test_unknown_product_is_not_found() {
    let backend = FakeBackend::start().await;
    let dir = tempfile::tempdir().unwrap();
    let state = backend.client_state(dir.path());

    let err = state.product(ProductId::new(999)).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::Backend(bikeshop_storefront::api::ApiError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_search_pages_through_results() {
    let backend = FakeBackend::start().await;
    for id in 100..110 {
        backend.add_product(id, &format!("Giant Kids {id}"), 2_000_000.0);
    }
    let dir = tempfile::tempdir().unwrap();
    let state = backend.client_state(dir.path());

    // 3 seeded Giant bikes plus 10 added: two pages of 9
    let first = state.search().search_now("giant").await.unwrap();
    assert_eq!(first.products.len(), 9);
    assert_eq!(first.total_pages, 2);
    assert!(first.has_more);

    state.search().load_more().await.unwrap();
    let all = state.search().results();
    assert_eq!(all.products.len(), 13);
    assert!(!all.has_more);

    let requests = backend.requests();
    let queries: Vec<Option<&str>> = requests.iter().map(|r| r.query.as_deref()).collect();
    assert_eq!(
        queries,
        vec![
            Some("keyword=giant&page=0&size=9"),
            Some("keyword=giant&page=1&size=9"),
        ]
    );
}

#[tokio::test]
async fn test_browse_whole_catalog() {
    let backend = FakeBackend::start().await;
    let dir = tempfile::tempdir().unwrap();
    let state = backend.client_state(dir.path());

    let page = state.browse(&ProductFilter::default(), 0).await.unwrap();

    assert_eq!(ids(&page), vec![3, 7, 12, 15]);
    assert!(!page.has_more());
    let requests = backend.requests();
    assert_eq!(requests[0].line(), "GET /api/all-products");
    assert_eq!(requests[0].query.as_deref(), Some("page=0&size=9"));
}

#[tokio::test]
async fn test_browse_category_uses_category_listing() {
    let backend = FakeBackend::start().await;
    let dir = tempfile::tempdir().unwrap();
    let state = backend.client_state(dir.path());
    let city = ProductFilter {
        category: Some("city".to_string()),
        ..ProductFilter::default()
    };

    let page = state.browse(&city, 0).await.unwrap();

    assert_eq!(ids(&page), vec![3, 7]);
    assert!(page.products.iter().all(|p| p.category == "city"));
    assert_eq!(
        backend.requests()[0].line(),
        "GET /api/all-products/category/city"
    );
}

#[tokio::test]
async fn test_browse_with_filter_sends_only_set_criteria() {
    let backend = FakeBackend::start().await;
    let dir = tempfile::tempdir().unwrap();
    let state = backend.client_state(dir.path());
    let cheap_giants = ProductFilter {
        brand: Some("Giant".to_string()),
        max_price: Some(Price::new(10_000_000)),
        ..ProductFilter::default()
    };

    let page = state.browse(&cheap_giants, 0).await.unwrap();

    assert_eq!(ids(&page), vec![7, 15]);
    let requests = backend.requests();
    assert_eq!(requests[0].line(), "GET /api/all-products/filter");
    assert_eq!(
        requests[0].query.as_deref(),
        Some("brand=Giant&maxPrice=10000000&page=0&size=9")
    );
}

#[tokio::test]
async fn test_browse_is_not_user_scoped() {
    let backend = FakeBackend::start().await;
    let dir = tempfile::tempdir().unwrap();
    let state = backend.client_state(dir.path());
    state.resolve_session().await.unwrap();
    backend.clear_requests();

    state.browse(&ProductFilter::default(), 0).await.unwrap();

    assert!(backend.requests().iter().all(|r| !r.is_user_scoped()));
}
