//! Plumbing shared by the cart and wishlist mirrors.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::Utc;
use tracing::warn;

use bikeshop_core::{ProductId, SessionState, UserId};

use crate::error::StoreError;
use crate::session::{Session, SessionEpoch};

/// Where a mutation is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Anonymous visitor: local storage is authoritative.
    Local,
    /// Signed-in user: the backend is authoritative. Results arriving after
    /// the session leaves `epoch` are dropped.
    Remote { user_id: UserId, epoch: SessionEpoch },
}

/// Pick the channel for a mutation, refusing while the session is unresolved.
pub fn channel(session: &Session, operation: &'static str) -> Result<Channel, StoreError> {
    let (state, epoch) = session.snapshot();
    match state {
        SessionState::Unresolved => {
            warn!(operation, "Session not resolved; mutation refused");
            Err(StoreError::SessionNotReady)
        }
        SessionState::Anonymous => Ok(Channel::Local),
        SessionState::Authenticated(user) => Ok(Channel::Remote {
            user_id: user.id,
            epoch,
        }),
    }
}

/// Id for a locally created line: current epoch millis, bumped past any
/// existing id so two adds in the same millisecond stay distinct.
pub fn next_local_id(existing: impl Iterator<Item = i64>) -> i64 {
    let now = Utc::now().timestamp_millis();
    existing
        .max()
        .map_or(now, |max| now.max(max.saturating_add(1)))
}

/// Keep the first item per product id.
pub fn dedupe<T>(items: Vec<T>, product_of: impl Fn(&T) -> ProductId) -> Vec<T> {
    let mut seen = HashSet::new();
    let before = items.len();
    let kept: Vec<T> = items
        .into_iter()
        .filter(|item| seen.insert(product_of(item)))
        .collect();
    if kept.len() != before {
        warn!(dropped = before - kept.len(), "Dropped duplicate lines for the same product");
    }
    kept
}

/// Counts one in-flight fetch for the lifetime of the guard. A store is
/// fetching while its counter is above zero.
pub struct FetchGuard<'a>(&'a AtomicUsize);

impl<'a> FetchGuard<'a> {
    pub fn new(in_flight: &'a AtomicUsize) -> Self {
        in_flight.fetch_add(1, Ordering::SeqCst);
        Self(in_flight)
    }
}

impl Drop for FetchGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_next_local_id_is_unique() {
        let first = next_local_id(std::iter::empty());
        let second = next_local_id([first].into_iter());
        assert!(second > first);

        let far_future = i64::MAX - 1;
        assert_eq!(next_local_id([far_future].into_iter()), i64::MAX);
    }

    #[test]
    fn test_dedupe_keeps_first() {
        let items = vec![(ProductId::new(1), "a"), (ProductId::new(2), "b"), (ProductId::new(1), "c")];
        let kept = dedupe(items, |(id, _)| *id);
        assert_eq!(kept, vec![(ProductId::new(1), "a"), (ProductId::new(2), "b")]);
    }

    #[test]
    fn test_overlapping_fetch_guards() {
        let in_flight = AtomicUsize::new(0);
        let first = FetchGuard::new(&in_flight);
        let second = FetchGuard::new(&in_flight);
        assert_eq!(in_flight.load(Ordering::SeqCst), 2);

        // The first fetch finishing must not hide the second
        drop(first);
        assert_eq!(in_flight.load(Ordering::SeqCst), 1);

        drop(second);
        assert_eq!(in_flight.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_channel_carries_session_epoch() {
        use std::sync::Arc;

        use crate::storage::MemoryStorage;
        use crate::test_support::{anonymous, authenticated, unresolved};

        let storage = Arc::new(MemoryStorage::new());
        assert!(matches!(
            channel(&unresolved(storage.clone()), "test"),
            Err(StoreError::SessionNotReady)
        ));
        assert_eq!(channel(&anonymous(storage.clone()), "test").unwrap(), Channel::Local);

        let session = authenticated(42, storage);
        let Channel::Remote { user_id, epoch } = channel(&session, "test").unwrap() else {
            panic!("expected remote channel");
        };
        assert_eq!(user_id, UserId::new(42));
        assert!(session.is_current(epoch));
    }
}
