//! Cart and wishlist flows against the fake backend.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use secrecy::SecretString;
use serde_json::json;

use bikeshop_core::{ProductId, Quantity};
use bikeshop_integration_tests::{FakeBackend, PASSWORD, USER_ID, USERNAME};
use bikeshop_storefront::StoreError;

#[tokio::test]
async fn test_authenticated_toggle_posts_then_refetches() {
    let backend = FakeBackend::start().await;
    let dir = tempfile::tempdir().unwrap();
    let state = backend.client_state(dir.path());
    state
        .login(USERNAME, &SecretString::from(PASSWORD))
        .await
        .unwrap();
    let bike = state.product(ProductId::new(3)).await.unwrap();
    backend.clear_requests();

    state.cart().toggle(&bike).await.unwrap();

    let requests = backend.requests();
    let lines: Vec<String> = requests.iter().map(|r| r.line()).collect();
    assert_eq!(lines, vec!["POST /api/cart/add", "GET /api/cart/42"]);
    assert_eq!(
        requests[0].body,
        Some(json!({ "userId": 42, "productId": 3, "quantity": 1 }))
    );

    let cart = state.cart().lines();
    assert_eq!(cart.len(), 1);
    assert_eq!(cart[0].product_id, ProductId::new(3));
    assert_eq!(cart[0].quantity, Quantity::ONE);
    assert!(state.cart().is_in_cart(bike.id));
    assert_eq!(backend.cart_of(USER_ID), vec![(3, 1)]);
}

#[tokio::test]
async fn test_authenticated_update_remove_and_clear() {
    let backend = FakeBackend::start().await;
    let dir = tempfile::tempdir().unwrap();
    let state = backend.client_state(dir.path());
    state
        .login(USERNAME, &SecretString::from(PASSWORD))
        .await
        .unwrap();
    let road = state.product(ProductId::new(12)).await.unwrap();
    let mtb = state.product(ProductId::new(15)).await.unwrap();
    state.cart().toggle(&road).await.unwrap();
    state.cart().toggle(&mtb).await.unwrap();

    let line = state.cart().line_for(road.id).unwrap();
    backend.clear_requests();
    state
        .cart()
        .update_quantity(line.id, Quantity::new(3).unwrap())
        .await
        .unwrap();
    let update = &backend.requests()[0];
    assert_eq!(update.line(), format!("PUT /api/cart/update/{}", line.id));
    assert_eq!(update.query.as_deref(), Some("quantity=3"));
    assert_eq!(state.cart().item_count(), 4);

    // Toggling a present product deletes by line id
    let mtb_line = state.cart().line_for(mtb.id).unwrap();
    backend.clear_requests();
    state.cart().toggle(&mtb).await.unwrap();
    assert_eq!(
        backend.requests()[0].line(),
        format!("DELETE /api/cart/delete/{}", mtb_line.id)
    );
    assert!(!state.cart().is_in_cart(mtb.id));

    state.cart().clear().await.unwrap();
    assert!(state.cart().lines().is_empty());
    assert!(backend.cart_of(USER_ID).is_empty());
}

#[tokio::test]
async fn test_failed_update_rolls_back() {
    let backend = FakeBackend::start().await;
    let dir = tempfile::tempdir().unwrap();
    let state = backend.client_state(dir.path());
    state
        .login(USERNAME, &SecretString::from(PASSWORD))
        .await
        .unwrap();
    let bike = state.product(ProductId::new(7)).await.unwrap();
    state.cart().toggle(&bike).await.unwrap();
    let line = state.cart().line_for(bike.id).unwrap();
    backend.fail_path(&format!("/api/cart/update/{}", line.id));

    let err = state
        .cart()
        .update_quantity(line.id, Quantity::new(5).unwrap())
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::Backend(_)));
    assert_eq!(state.cart().line_for(bike.id).unwrap().quantity, Quantity::ONE);
}

#[tokio::test]
async fn test_anonymous_cart_never_calls_user_endpoints() {
    let backend = FakeBackend::start().await;
    let dir = tempfile::tempdir().unwrap();
    let state = backend.client_state(dir.path());
    state.resolve_session().await.unwrap();
    let bike = state.product(ProductId::new(7)).await.unwrap();

    state.cart().toggle(&bike).await.unwrap();
    state.wishlist().toggle(&bike).await.unwrap();
    let line = state.cart().line_for(bike.id).unwrap();
    state
        .cart()
        .update_quantity(line.id, Quantity::new(2).unwrap())
        .await
        .unwrap();

    assert!(backend.requests().iter().all(|r| !r.is_user_scoped()));

    // The stored cart holds one entry for product 7 and survives a restart
    let raw = std::fs::read_to_string(dir.path().join("cart")).unwrap();
    let stored: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(stored.as_array().unwrap().len(), 1);
    assert_eq!(stored[0]["productId"], 7);

    let restarted = backend.client_state(dir.path());
    restarted.resolve_session().await.unwrap();
    assert!(restarted.cart().is_in_cart(bike.id));
    assert!(restarted.wishlist().is_in_wishlist(bike.id));
    assert_eq!(restarted.cart().item_count(), 2);
}

#[tokio::test]
async fn test_unresolved_session_refuses_without_network() {
    let backend = FakeBackend::start().await;
    let dir = tempfile::tempdir().unwrap();
    let state = backend.client_state(dir.path());
    let bike = state.product(ProductId::new(7)).await.unwrap();
    backend.clear_requests();

    let err = state.cart().toggle(&bike).await.unwrap_err();

    assert!(matches!(err, StoreError::SessionNotReady));
    assert!(backend.requests().is_empty());
    assert!(state.cart().lines().is_empty());
    assert!(!dir.path().join("cart").exists());
}

#[tokio::test]
async fn test_login_keeps_anonymous_cart_for_later() {
    let backend = FakeBackend::start().await;
    let dir = tempfile::tempdir().unwrap();
    let state = backend.client_state(dir.path());
    state.resolve_session().await.unwrap();
    let bike = state.product(ProductId::new(7)).await.unwrap();
    state.cart().toggle(&bike).await.unwrap();

    state
        .login(USERNAME, &SecretString::from(PASSWORD))
        .await
        .unwrap();
    // No merge: the backend cart is what counts now
    assert!(state.cart().lines().is_empty());
    assert!(backend.cart_of(USER_ID).is_empty());

    state.logout().await.unwrap();
    assert!(state.cart().is_in_cart(bike.id));
}

#[tokio::test]
async fn test_wishlist_clear_deletes_each_entry() {
    let backend = FakeBackend::start().await;
    let dir = tempfile::tempdir().unwrap();
    let state = backend.client_state(dir.path());
    state
        .login(USERNAME, &SecretString::from(PASSWORD))
        .await
        .unwrap();
    for id in [3, 7, 12] {
        let product = state.product(ProductId::new(id)).await.unwrap();
        state.wishlist().toggle(&product).await.unwrap();
    }
    assert_eq!(backend.wishlist_of(USER_ID), vec![3, 7, 12]);
    backend.clear_requests();

    state.wishlist().clear().await.unwrap();

    let requests = backend.requests();
    let deletes = requests
        .iter()
        .filter(|r| r.path.starts_with("/api/wishlist/delete/"))
        .count();
    assert_eq!(deletes, 3);
    assert!(requests.iter().all(|r| !r.path.starts_with("/api/cart/")));
    assert!(state.wishlist().entries().is_empty());
    assert!(backend.wishlist_of(USER_ID).is_empty());
}
