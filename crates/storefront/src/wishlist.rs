//! Wishlist mirror.
//!
//! Same channel rules as the cart: refused while the session is unresolved,
//! local storage under `wishlist` while anonymous, backend plus refetch once
//! authenticated. Entries carry no quantity.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};

use tracing::{debug, error, instrument, warn};

use bikeshop_core::{Product, ProductId, SessionState, UserId, WishlistEntry, WishlistEntryId};

use crate::error::StoreError;
use crate::mirror::{Channel, FetchGuard, channel, dedupe, next_local_id};
use crate::ports::WishlistBackend;
use crate::session::{Session, SessionEpoch};
use crate::storage::{LocalStorage, StorageError, keys, load_json, save_json};

/// Shared wishlist handle.
#[derive(Clone)]
pub struct WishlistStore {
    inner: Arc<WishlistStoreInner>,
}

struct WishlistStoreInner {
    backend: Arc<dyn WishlistBackend>,
    session: Session,
    storage: Arc<dyn LocalStorage>,
    entries: RwLock<Vec<WishlistEntry>>,
    fetching: AtomicUsize,
}

impl WishlistStore {
    #[must_use]
    pub fn new(
        backend: Arc<dyn WishlistBackend>,
        session: Session,
        storage: Arc<dyn LocalStorage>,
    ) -> Self {
        Self {
            inner: Arc::new(WishlistStoreInner {
                backend,
                session,
                storage,
                entries: RwLock::new(Vec::new()),
                fetching: AtomicUsize::new(0),
            }),
        }
    }

    #[must_use]
    pub fn entries(&self) -> Vec<WishlistEntry> {
        self.inner
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn is_in_wishlist(&self, product_id: ProductId) -> bool {
        self.entry_for(product_id).is_some()
    }

    fn entry_for(&self, product_id: ProductId) -> Option<WishlistEntry> {
        self.inner
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|entry| entry.product_id == product_id)
            .cloned()
    }

    #[must_use]
    pub fn is_fetching(&self) -> bool {
        self.inner.fetching.load(Ordering::SeqCst) > 0
    }

    /// Add `product`, or remove it if already present.
    ///
    /// # Errors
    ///
    /// Returns `SessionNotReady` while unresolved, or the backend/storage
    /// error that stopped the change.
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn toggle(&self, product: &Product) -> Result<(), StoreError> {
        let channel = channel(&self.inner.session, "wishlist.toggle")?;
        if self.is_in_wishlist(product.id) {
            return self.remove(product.id).await;
        }

        match channel {
            Channel::Remote { user_id, epoch } => {
                self.inner
                    .backend
                    .add_wishlist_entry(user_id, product.id)
                    .await
                    .map_err(|e| {
                        error!(error = %e, "Failed to add wishlist entry");
                        e
                    })?;
                self.refetch(user_id, epoch).await
            }
            Channel::Local => self.mutate_local(|entries| {
                if entries.iter().any(|e| e.product_id == product.id) {
                    return;
                }
                let id = next_local_id(entries.iter().map(|e| e.id.as_i64()));
                entries.push(WishlistEntry {
                    id: WishlistEntryId::new(id),
                    user_id: None,
                    product_id: product.id,
                    product: product.snapshot(),
                });
            }),
        }
    }

    /// Remove `product_id`. Absent products are a no-op.
    ///
    /// # Errors
    ///
    /// Returns `SessionNotReady` while unresolved, or the backend/storage
    /// error that stopped the change.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn remove(&self, product_id: ProductId) -> Result<(), StoreError> {
        let channel = channel(&self.inner.session, "wishlist.remove")?;
        let Some(entry) = self.entry_for(product_id) else {
            return Ok(());
        };

        match channel {
            Channel::Remote { user_id, epoch } => {
                self.delete_remote(entry.id).await?;
                self.refetch(user_id, epoch).await
            }
            Channel::Local => {
                self.mutate_local(|entries| entries.retain(|e| e.product_id != product_id))
            }
        }
    }

    /// Remove every entry.
    ///
    /// The backend has no bulk wishlist delete, so an authenticated clear
    /// deletes entries one at a time and stops at the first failure. The
    /// store is refetched either way so it reflects what was deleted.
    ///
    /// # Errors
    ///
    /// Returns `SessionNotReady` while unresolved, or the first
    /// backend/storage error.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<(), StoreError> {
        match channel(&self.inner.session, "wishlist.clear")? {
            Channel::Remote { user_id, epoch } => {
                let ids: Vec<WishlistEntryId> = self.entries().iter().map(|e| e.id).collect();
                for id in ids {
                    if let Err(e) = self.delete_remote(id).await {
                        if let Err(refetch) = self.refetch(user_id, epoch).await {
                            warn!(error = %refetch, "Refetch after partial clear failed");
                        }
                        return Err(e);
                    }
                }
                self.refetch(user_id, epoch).await
            }
            Channel::Local => self.mutate_local(Vec::clear),
        }
    }

    /// Reload entries from the channel the session now makes authoritative.
    ///
    /// # Errors
    ///
    /// Returns the backend or storage error. A failed backend fetch leaves
    /// the store empty.
    #[instrument(skip(self))]
    pub async fn sync_with_session(&self) -> Result<(), StoreError> {
        let (state, epoch) = self.inner.session.snapshot();
        match state {
            SessionState::Unresolved => Ok(()),
            SessionState::Anonymous => {
                let entries = self.load_local()?;
                *self.write_entries() = entries;
                Ok(())
            }
            SessionState::Authenticated(user) => {
                let result = self.refetch(user.id, epoch).await;
                if result.is_err() {
                    if let Some(mut entries) = self.entries_if_current(epoch) {
                        entries.clear();
                    }
                }
                result
            }
        }
    }

    fn write_entries(&self) -> RwLockWriteGuard<'_, Vec<WishlistEntry>> {
        self.inner
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Write access for results of work started under `epoch`, or `None`
    /// once the session has moved on.
    fn entries_if_current(
        &self,
        epoch: SessionEpoch,
    ) -> Option<RwLockWriteGuard<'_, Vec<WishlistEntry>>> {
        let entries = self.write_entries();
        if self.inner.session.is_current(epoch) {
            Some(entries)
        } else {
            debug!("Session changed while a wishlist request was in flight; discarding result");
            None
        }
    }

    fn mutate_local(&self, change: impl FnOnce(&mut Vec<WishlistEntry>)) -> Result<(), StoreError> {
        let mut entries = self.write_entries();
        let mut next = entries.clone();
        change(&mut next);
        save_json(self.inner.storage.as_ref(), keys::WISHLIST, &next).map_err(|e| {
            error!(error = %e, "Failed to persist wishlist");
            e
        })?;
        *entries = next;
        Ok(())
    }

    fn load_local(&self) -> Result<Vec<WishlistEntry>, StoreError> {
        match load_json::<Vec<WishlistEntry>>(self.inner.storage.as_ref(), keys::WISHLIST) {
            Ok(entries) => Ok(dedupe(entries.unwrap_or_default(), |e| e.product_id)),
            Err(StorageError::Corrupt { key, source }) => {
                warn!(key, error = %source, "Discarding unreadable stored wishlist");
                self.inner.storage.remove(keys::WISHLIST)?;
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_remote(&self, entry_id: WishlistEntryId) -> Result<(), StoreError> {
        self.inner
            .backend
            .delete_wishlist_entry(entry_id)
            .await
            .map_err(|e| {
                error!(error = %e, entry_id = %entry_id, "Failed to delete wishlist entry");
                StoreError::from(e)
            })
    }

    async fn refetch(&self, user_id: UserId, epoch: SessionEpoch) -> Result<(), StoreError> {
        let _guard = FetchGuard::new(&self.inner.fetching);
        let fetched = self
            .inner
            .backend
            .fetch_wishlist(user_id)
            .await
            .map_err(|e| {
                error!(error = %e, user_id = %user_id, "Failed to fetch wishlist");
                e
            })?;
        debug!(entries = fetched.len(), "Fetched wishlist");
        if let Some(mut entries) = self.entries_if_current(epoch) {
            *entries = fetched;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use crate::ports::MockWishlistBackend;
    use crate::storage::MemoryStorage;
    use crate::test_support::{
        GatedBackend, anonymous, authenticated, product, remote_entry, unresolved,
    };

    #[tokio::test]
    async fn test_authenticated_toggle_adds_then_refetches() {
        let helmet = product(11, 850_000);
        let fetched = remote_entry(70, 42, &helmet);
        let mut backend = MockWishlistBackend::new();
        backend
            .expect_add_wishlist_entry()
            .withf(|user, product| user.as_i64() == 42 && product.as_i64() == 11)
            .times(1)
            .returning(|_, _| Ok(()));
        backend
            .expect_fetch_wishlist()
            .times(1)
            .returning(move |_| Ok(vec![fetched.clone()]));
        let storage = Arc::new(MemoryStorage::new());
        let store = WishlistStore::new(Arc::new(backend), authenticated(42, storage.clone()), storage);

        store.toggle(&helmet).await.unwrap();

        assert!(store.is_in_wishlist(helmet.id));
    }

    #[tokio::test]
    async fn test_clear_deletes_each_entry_then_refetches() {
        let (a, b) = (product(1, 10), product(2, 20));
        let initial = vec![remote_entry(70, 42, &a), remote_entry(71, 42, &b)];
        let mut backend = MockWishlistBackend::new();
        let mut seq = mockall::Sequence::new();
        backend
            .expect_fetch_wishlist()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_| Ok(initial.clone()));
        backend
            .expect_delete_wishlist_entry()
            .withf(|id| id.as_i64() == 70)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        backend
            .expect_delete_wishlist_entry()
            .withf(|id| id.as_i64() == 71)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        backend
            .expect_fetch_wishlist()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(Vec::new()));
        let storage = Arc::new(MemoryStorage::new());
        let store = WishlistStore::new(Arc::new(backend), authenticated(42, storage.clone()), storage);
        store.sync_with_session().await.unwrap();

        store.clear().await.unwrap();

        assert!(store.entries().is_empty());
    }

    #[tokio::test]
    async fn test_partial_clear_failure_refetches_and_reports() {
        let (a, b) = (product(1, 10), product(2, 20));
        let initial = vec![remote_entry(70, 42, &a), remote_entry(71, 42, &b)];
        let remaining = vec![remote_entry(71, 42, &b)];
        let mut backend = MockWishlistBackend::new();
        let mut seq = mockall::Sequence::new();
        backend
            .expect_fetch_wishlist()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_| Ok(initial.clone()));
        backend
            .expect_delete_wishlist_entry()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        backend
            .expect_delete_wishlist_entry()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(ApiError::Unauthorized));
        backend
            .expect_fetch_wishlist()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_| Ok(remaining.clone()));
        let storage = Arc::new(MemoryStorage::new());
        let store = WishlistStore::new(Arc::new(backend), authenticated(42, storage.clone()), storage);
        store.sync_with_session().await.unwrap();

        let err = store.clear().await.unwrap_err();

        assert!(err.is_unauthorized());
        assert_eq!(store.entries().len(), 1);
        assert!(store.is_in_wishlist(b.id));
    }

    #[tokio::test]
    async fn test_refetch_finishing_after_logout_is_discarded() {
        let storage = Arc::new(MemoryStorage::new());
        let held = product(3, 12_990_000);
        let backend = Arc::new(GatedBackend::new(
            Vec::new(),
            vec![remote_entry(70, 42, &held)],
        ));
        let session = authenticated(42, storage.clone());
        let store = WishlistStore::new(backend.clone(), session.clone(), storage.clone());

        let toggled_product = product(5, 100);
        let toggle = store.toggle(&toggled_product);
        let logout = async {
            backend.entered.notified().await;
            session.set_state(SessionState::Anonymous);
            store.sync_with_session().await.unwrap();
            assert!(store.is_fetching());
            backend.release.notify_one();
        };
        let (toggled, ()) = tokio::join!(toggle, logout);

        toggled.unwrap();
        assert!(!store.is_in_wishlist(held.id));
        assert!(!store.is_fetching());

        store.toggle(&product(8, 200)).await.unwrap();
        let stored: Vec<WishlistEntry> =
            load_json(storage.as_ref(), keys::WISHLIST).unwrap().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].product_id, ProductId::new(8));
        assert_eq!(stored[0].user_id, None);
    }

    #[tokio::test]
    async fn test_anonymous_uses_own_storage_key() {
        let storage = Arc::new(MemoryStorage::new());
        let store = WishlistStore::new(
            Arc::new(MockWishlistBackend::new()),
            anonymous(storage.clone()),
            storage.clone(),
        );
        let bike = product(7, 1_000_000);

        store.toggle(&bike).await.unwrap();

        assert!(storage.get(keys::WISHLIST).unwrap().is_some());
        assert_eq!(storage.get(keys::CART).unwrap(), None);

        let reloaded = WishlistStore::new(
            Arc::new(MockWishlistBackend::new()),
            anonymous(storage.clone()),
            storage.clone(),
        );
        reloaded.sync_with_session().await.unwrap();
        assert!(reloaded.is_in_wishlist(bike.id));

        reloaded.toggle(&bike).await.unwrap();
        reloaded.toggle(&product(8, 1)).await.unwrap();
        reloaded.clear().await.unwrap();
        assert!(reloaded.entries().is_empty());
        assert_eq!(storage.get(keys::WISHLIST).unwrap().as_deref(), Some("[]"));
    }

    #[tokio::test]
    async fn test_unresolved_refuses() {
        let storage = Arc::new(MemoryStorage::new());
        let store = WishlistStore::new(
            Arc::new(MockWishlistBackend::new()),
            unresolved(storage.clone()),
            storage.clone(),
        );

        assert!(matches!(
            store.toggle(&product(1, 1)).await,
            Err(StoreError::SessionNotReady)
        ));
        assert!(matches!(store.clear().await, Err(StoreError::SessionNotReady)));
        assert!(store.entries().is_empty());
        assert_eq!(storage.get(keys::WISHLIST).unwrap(), None);
    }
}
