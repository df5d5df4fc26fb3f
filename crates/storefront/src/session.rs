//! Session identity.
//!
//! [`Session`] tracks who the visitor is and keeps the `user` and `token`
//! storage keys in step with the backend. It starts [`SessionState::Unresolved`]
//! and only [`Session::resolve`], [`Session::login`] and [`Session::logout`]
//! move it. Stores read the state; they never change it.

use std::sync::{Arc, PoisonError, RwLock};

use secrecy::{ExposeSecret, SecretString};
use tracing::{error, info, instrument, warn};

use bikeshop_core::{SessionState, UserId, UserProfile};

use crate::error::StoreError;
use crate::ports::SessionBackend;
use crate::storage::{LocalStorage, keys, save_json};

/// Shared session handle. Clones observe the same state.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    backend: Arc<dyn SessionBackend>,
    storage: Arc<dyn LocalStorage>,
    current: RwLock<Current>,
}

struct Current {
    state: SessionState,
    epoch: SessionEpoch,
}

/// Counts identity changes. Work started under one epoch must not publish
/// results once the session has moved to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SessionEpoch(u64);

/// Same visitor: same variant and same user id.
fn same_identity(a: &SessionState, b: &SessionState) -> bool {
    std::mem::discriminant(a) == std::mem::discriminant(b)
        && a.user().map(|u| u.id) == b.user().map(|u| u.id)
}

impl Session {
    /// Create an unresolved session.
    #[must_use]
    pub fn new(backend: Arc<dyn SessionBackend>, storage: Arc<dyn LocalStorage>) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                backend,
                storage,
                current: RwLock::new(Current {
                    state: SessionState::Unresolved,
                    epoch: SessionEpoch(0),
                }),
            }),
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.snapshot().0
    }

    /// Current state and the epoch it belongs to, read together.
    pub(crate) fn snapshot(&self) -> (SessionState, SessionEpoch) {
        let current = self
            .inner
            .current
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        (current.state.clone(), current.epoch)
    }

    /// Whether the identity is still the one `epoch` was taken under.
    pub(crate) fn is_current(&self, epoch: SessionEpoch) -> bool {
        self.inner
            .current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .epoch
            == epoch
    }

    /// Signed-in user id, if any.
    #[must_use]
    pub fn user_id(&self) -> Option<UserId> {
        self.state().user().map(|u| u.id)
    }

    pub(crate) fn set_state(&self, state: SessionState) {
        let mut current = self
            .inner
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if !same_identity(&current.state, &state) {
            current.epoch = SessionEpoch(current.epoch.0.wrapping_add(1));
        }
        current.state = state;
    }

    /// Ask the backend who we are.
    ///
    /// Always leaves the session resolved. A backend failure is logged and
    /// treated as anonymous.
    #[instrument(skip(self))]
    pub async fn resolve(&self) -> SessionState {
        match self.inner.storage.get(keys::TOKEN) {
            Ok(Some(token)) => self
                .inner
                .backend
                .import_credentials(&SecretString::from(token)),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Failed to read stored session token"),
        }

        let state = match self.inner.backend.current_user().await {
            Ok(Some(user)) => {
                info!(user_id = %user.id, "Session resolved");
                self.remember_user(&user);
                SessionState::Authenticated(user)
            }
            Ok(None) => {
                info!("Session resolved as anonymous");
                self.forget(&[keys::USER, keys::TOKEN]);
                SessionState::Anonymous
            }
            Err(e) => {
                error!(error = %e, "Failed to resolve session; continuing as anonymous");
                self.forget(&[keys::USER]);
                SessionState::Anonymous
            }
        };

        self.set_state(state.clone());
        state
    }

    /// Sign in.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Backend` if the backend rejects the credentials
    /// or cannot be reached. The session state is unchanged on error.
    #[instrument(skip(self, password))]
    pub async fn login(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<UserProfile, StoreError> {
        let outcome = self
            .inner
            .backend
            .login(username, password)
            .await
            .map_err(|e| {
                error!(error = %e, "Login failed");
                e
            })?;

        let token = outcome
            .token
            .or_else(|| self.inner.backend.export_credentials());
        match token {
            Some(token) => {
                if let Err(e) = self.inner.storage.set(keys::TOKEN, token.expose_secret()) {
                    warn!(error = %e, "Failed to persist session token");
                }
            }
            None => warn!("Login succeeded without a session token"),
        }

        self.remember_user(&outcome.user);
        info!(user_id = %outcome.user.id, "Logged in");
        self.set_state(SessionState::Authenticated(outcome.user.clone()));
        Ok(outcome.user)
    }

    /// Sign out.
    ///
    /// Local identity is cleared and the session becomes anonymous whether
    /// or not the backend call succeeds.
    ///
    /// # Errors
    ///
    /// Returns the backend error, after local state has been cleared.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<(), StoreError> {
        let result = self.inner.backend.logout().await;
        if let Err(e) = &result {
            error!(error = %e, "Backend logout failed; clearing local session anyway");
        }

        self.forget(&[keys::USER, keys::TOKEN]);
        self.set_state(SessionState::Anonymous);
        info!("Logged out");
        result.map_err(StoreError::from)
    }

    fn remember_user(&self, user: &UserProfile) {
        if let Err(e) = save_json(self.inner.storage.as_ref(), keys::USER, user) {
            warn!(error = %e, "Failed to persist user profile");
        }
    }

    fn forget(&self, names: &[&str]) {
        for key in names {
            if let Err(e) = self.inner.storage.remove(key) {
                warn!(key, error = %e, "Failed to clear storage key");
            }
        }
    }

    /// A session pinned to `state` with a backend that expects no calls.
    #[cfg(test)]
    pub(crate) fn fixed(state: SessionState, storage: Arc<dyn LocalStorage>) -> Self {
        let session = Self::new(
            Arc::new(crate::ports::MockSessionBackend::new()),
            storage,
        );
        session.set_state(state);
        session
    }
}
