//! Cart mirror.
//!
//! [`CartStore`] holds the visitor's cart lines and routes every mutation to
//! the channel the session makes authoritative:
//!
//! - unresolved: mutations are refused with [`StoreError::SessionNotReady`]
//! - anonymous: lines live in local storage under `cart`, written on every
//!   change
//! - authenticated: the backend owns the lines; each write is followed by a
//!   refetch
//!
//! Membership is keyed by product id. A product appears on at most one line.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};

use tracing::{debug, error, instrument, warn};

use bikeshop_core::{CartLine, CartLineId, Price, Product, ProductId, Quantity, SessionState, UserId};

use crate::error::StoreError;
use crate::mirror::{Channel, FetchGuard, channel, dedupe, next_local_id};
use crate::ports::CartBackend;
use crate::session::{Session, SessionEpoch};
use crate::storage::{LocalStorage, StorageError, keys, load_json, save_json};

/// Shared cart handle. Clones observe the same lines.
#[derive(Clone)]
pub struct CartStore {
    inner: Arc<CartStoreInner>,
}

struct CartStoreInner {
    backend: Arc<dyn CartBackend>,
    session: Session,
    storage: Arc<dyn LocalStorage>,
    lines: RwLock<Vec<CartLine>>,
    fetching: AtomicUsize,
}

impl CartStore {
    /// Create an empty store. Call [`sync_with_session`](Self::sync_with_session)
    /// once the session resolves.
    #[must_use]
    pub fn new(
        backend: Arc<dyn CartBackend>,
        session: Session,
        storage: Arc<dyn LocalStorage>,
    ) -> Self {
        Self {
            inner: Arc::new(CartStoreInner {
                backend,
                session,
                storage,
                lines: RwLock::new(Vec::new()),
                fetching: AtomicUsize::new(0),
            }),
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Current lines.
    #[must_use]
    pub fn lines(&self) -> Vec<CartLine> {
        self.inner
            .lines
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn is_in_cart(&self, product_id: ProductId) -> bool {
        self.line_for(product_id).is_some()
    }

    /// The line holding `product_id`, if any.
    #[must_use]
    pub fn line_for(&self, product_id: ProductId) -> Option<CartLine> {
        self.inner
            .lines
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|line| line.product_id == product_id)
            .cloned()
    }

    /// Total units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.inner
            .lines
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .fold(0u32, |acc, line| acc.saturating_add(line.quantity.get()))
    }

    /// Sum of price times quantity, or `None` on overflow.
    #[must_use]
    pub fn subtotal(&self) -> Option<Price> {
        self.inner
            .lines
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .try_fold(Price::ZERO, |acc, line| acc.checked_add(line.line_total()?))
    }

    /// Whether a backend fetch is in flight.
    #[must_use]
    pub fn is_fetching(&self) -> bool {
        self.inner.fetching.load(Ordering::SeqCst) > 0
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add `product` with quantity 1, or remove it if already present.
    ///
    /// # Errors
    ///
    /// Returns `SessionNotReady` while the session is unresolved, or the
    /// backend/storage error that stopped the change.
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn toggle(&self, product: &Product) -> Result<(), StoreError> {
        let channel = channel(&self.inner.session, "cart.toggle")?;
        if self.is_in_cart(product.id) {
            return self.remove(product.id).await;
        }

        match channel {
            Channel::Remote { user_id, epoch } => {
                self.inner
                    .backend
                    .add_cart_line(user_id, product.id, Quantity::ONE)
                    .await
                    .map_err(|e| {
                        error!(error = %e, "Failed to add cart line");
                        e
                    })?;
                self.refetch(user_id, epoch).await
            }
            Channel::Local => self.mutate_local(|lines| {
                if lines.iter().any(|l| l.product_id == product.id) {
                    return Ok(());
                }
                let id = next_local_id(lines.iter().map(|l| l.id.as_i64()));
                lines.push(CartLine {
                    id: CartLineId::new(id),
                    user_id: None,
                    product_id: product.id,
                    product: product.snapshot(),
                    quantity: Quantity::ONE,
                });
                Ok(())
            }),
        }
    }

    /// Remove the line holding `product_id`. Absent products are a no-op.
    ///
    /// # Errors
    ///
    /// Returns `SessionNotReady` while the session is unresolved, or the
    /// backend/storage error that stopped the change.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn remove(&self, product_id: ProductId) -> Result<(), StoreError> {
        let channel = channel(&self.inner.session, "cart.remove")?;
        let Some(line) = self.line_for(product_id) else {
            debug!("Product not in cart");
            return Ok(());
        };

        match channel {
            Channel::Remote { user_id, epoch } => {
                self.inner
                    .backend
                    .delete_cart_line(line.id)
                    .await
                    .map_err(|e| {
                        error!(error = %e, line_id = %line.id, "Failed to delete cart line");
                        e
                    })?;
                self.refetch(user_id, epoch).await
            }
            Channel::Local => self.mutate_local(|lines| {
                lines.retain(|l| l.product_id != product_id);
                Ok(())
            }),
        }
    }

    /// Set a line's quantity.
    ///
    /// The new quantity is visible as soon as the call starts. If the
    /// backend write fails the previous quantity is restored.
    ///
    /// # Errors
    ///
    /// Returns `SessionNotReady` while unresolved, `LineNotFound` for an
    /// unknown line, or the backend/storage error.
    #[instrument(skip(self), fields(line_id = %line_id, quantity = %quantity))]
    pub async fn update_quantity(
        &self,
        line_id: CartLineId,
        quantity: Quantity,
    ) -> Result<(), StoreError> {
        match channel(&self.inner.session, "cart.update_quantity")? {
            Channel::Local => self.mutate_local(|lines| {
                let line = lines
                    .iter_mut()
                    .find(|l| l.id == line_id)
                    .ok_or(StoreError::LineNotFound(line_id))?;
                line.quantity = quantity;
                Ok(())
            }),
            Channel::Remote { epoch, .. } => {
                let previous = {
                    let mut lines = self.write_lines();
                    let line = lines
                        .iter_mut()
                        .find(|l| l.id == line_id)
                        .ok_or(StoreError::LineNotFound(line_id))?;
                    std::mem::replace(&mut line.quantity, quantity)
                };

                if let Err(e) = self.inner.backend.update_cart_line(line_id, quantity).await {
                    error!(error = %e, "Failed to update cart line; rolling back");
                    // Only undo our own patch, and only in the view it was made in
                    if let Some(mut lines) = self.lines_if_current(epoch) {
                        if let Some(line) = lines
                            .iter_mut()
                            .find(|l| l.id == line_id && l.quantity == quantity)
                        {
                            line.quantity = previous;
                        }
                    }
                    return Err(e.into());
                }
                Ok(())
            }
        }
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns `SessionNotReady` while unresolved, or the backend/storage
    /// error. Lines are kept on error.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<(), StoreError> {
        match channel(&self.inner.session, "cart.clear")? {
            Channel::Remote { user_id, epoch } => {
                self.inner.backend.clear_cart(user_id).await.map_err(|e| {
                    error!(error = %e, "Failed to clear cart");
                    e
                })?;
                if let Some(mut lines) = self.lines_if_current(epoch) {
                    lines.clear();
                }
                Ok(())
            }
            Channel::Local => self.mutate_local(|lines| {
                lines.clear();
                Ok(())
            }),
        }
    }

    /// Reload lines from whichever channel the session now makes
    /// authoritative.
    ///
    /// # Errors
    ///
    /// Returns the backend or storage error. A failed backend fetch leaves
    /// the store empty rather than showing another identity's lines.
    #[instrument(skip(self))]
    pub async fn sync_with_session(&self) -> Result<(), StoreError> {
        let (state, epoch) = self.inner.session.snapshot();
        match state {
            SessionState::Unresolved => Ok(()),
            SessionState::Anonymous => {
                let lines = self.load_local()?;
                debug!(lines = lines.len(), "Loaded anonymous cart");
                *self.write_lines() = lines;
                Ok(())
            }
            SessionState::Authenticated(user) => {
                let result = self.refetch(user.id, epoch).await;
                if result.is_err() {
                    if let Some(mut lines) = self.lines_if_current(epoch) {
                        lines.clear();
                    }
                }
                result
            }
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn write_lines(&self) -> RwLockWriteGuard<'_, Vec<CartLine>> {
        self.inner
            .lines
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Write access for results of work started under `epoch`, or `None`
    /// once the session has moved on. Checked under the write lock so a
    /// resync for the new identity always lands after us.
    fn lines_if_current(
        &self,
        epoch: SessionEpoch,
    ) -> Option<RwLockWriteGuard<'_, Vec<CartLine>>> {
        let lines = self.write_lines();
        if self.inner.session.is_current(epoch) {
            Some(lines)
        } else {
            debug!("Session changed while a cart request was in flight; discarding result");
            None
        }
    }

    /// Apply `change` to a copy of the lines, persist it, then publish it.
    /// Nothing changes in memory if the write fails.
    fn mutate_local(
        &self,
        change: impl FnOnce(&mut Vec<CartLine>) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        let mut lines = self.write_lines();
        let mut next = lines.clone();
        change(&mut next)?;
        save_json(self.inner.storage.as_ref(), keys::CART, &next).map_err(|e| {
            error!(error = %e, "Failed to persist cart");
            e
        })?;
        *lines = next;
        Ok(())
    }

    fn load_local(&self) -> Result<Vec<CartLine>, StoreError> {
        match load_json::<Vec<CartLine>>(self.inner.storage.as_ref(), keys::CART) {
            Ok(lines) => Ok(dedupe(lines.unwrap_or_default(), |l| l.product_id)),
            Err(StorageError::Corrupt { key, source }) => {
                warn!(key, error = %source, "Discarding unreadable stored cart");
                self.inner.storage.remove(keys::CART)?;
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn refetch(&self, user_id: UserId, epoch: SessionEpoch) -> Result<(), StoreError> {
        let _guard = FetchGuard::new(&self.inner.fetching);
        let fetched = self.inner.backend.fetch_cart(user_id).await.map_err(|e| {
            error!(error = %e, user_id = %user_id, "Failed to fetch cart");
            e
        })?;
        debug!(lines = fetched.len(), "Fetched cart");
        if let Some(mut lines) = self.lines_if_current(epoch) {
            *lines = fetched;
        }
        Ok(())
    }
}
