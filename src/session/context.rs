use std::sync::Arc;

use parking_lot::RwLock;

use super::redirect::{DEFAULT_REDIRECT, is_allowed_redirect};
use super::traits::SessionStore;
use super::types::{Credentials, Session};
use crate::error::Error;
use crate::types::{AccessToken, User};

/// Explicitly shared session state.
///
/// Created once at start-up with [`init`](SessionContext::init) and handed
/// (as `Arc<SessionContext>`) to the HTTP adapter, the auth flow, the route
/// guard and any view that needs the current user. It is the only writer of
/// the underlying [`SessionStore`].
pub struct SessionContext {
    store: Arc<dyn SessionStore>,
    current: RwLock<Session>,
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("current", &*self.current.read())
            .finish_non_exhaustive()
    }
}

impl SessionContext {
    /// Load whatever the store holds and start from it.
    pub fn init(store: impl SessionStore) -> Self {
        Self::from_shared_store(Arc::new(store))
    }

    pub fn from_shared_store(store: Arc<dyn SessionStore>) -> Self {
        let session = store.load();
        tracing::debug!(authenticated = session.is_authenticated(), "Session context initialized");
        Self {
            store,
            current: RwLock::new(session),
        }
    }

    /// Snapshot of the current session.
    #[must_use]
    pub fn session(&self) -> Session {
        self.current.read().clone()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.current.read().is_authenticated()
    }

    #[must_use]
    pub fn token(&self) -> Option<AccessToken> {
        self.current.read().token().cloned()
    }

    #[must_use]
    pub fn user(&self) -> Option<User> {
        self.current.read().user().cloned()
    }

    /// Persist and adopt a new authenticated session.
    ///
    /// The store is written first; the in-memory session only changes if that
    /// succeeds. Both happen under the write lock, so no reader observes a
    /// state the store does not hold.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] if persisting fails. The previous session is
    /// kept in that case.
    pub fn establish(&self, credentials: Credentials) -> Result<(), Error> {
        let mut current = self.current.write();
        if current.credentials() == Some(&credentials) {
            return Ok(());
        }
        self.store.save(&credentials)?;
        tracing::info!(user_id = %credentials.user.id, "Session established");
        *current = Session::authenticated(credentials);
        Ok(())
    }

    /// Replace the stored user for the session's current token.
    ///
    /// No-op when the session is anonymous or the token changed meanwhile.
    pub(crate) fn refresh_user(&self, token: &AccessToken, user: User) -> Result<(), Error> {
        let current_token = self.current.read().token().cloned();
        match current_token {
            Some(held) if &held == token => self.establish(Credentials::new(held, user)),
            _ => Ok(()),
        }
    }

    /// Drop the session. Never leaves the context authenticated.
    ///
    /// A store failure is logged; the in-memory session is cleared regardless.
    pub fn clear(&self) {
        let mut current = self.current.write();
        let was_authenticated = current.is_authenticated();
        *current = Session::anonymous();
        if let Err(e) = self.store.clear() {
            tracing::error!(error = %e, "Failed to clear persisted session");
        }
        if was_authenticated {
            tracing::info!("Session cleared");
        }
    }

    /// Remember where to resume after authentication.
    ///
    /// Auth pages and non-relative targets are ignored (returns `false`) and
    /// leave any previously stored value in place.
    pub fn set_pending_redirect(&self, path: &str) -> bool {
        if !is_allowed_redirect(path) {
            tracing::debug!(path = %path, "Ignoring redirect target");
            return false;
        }
        match self.store.save_redirect(path) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to store redirect target");
                false
            }
        }
    }

    /// The stored redirect target, or `/`.
    #[must_use]
    pub fn pending_redirect(&self) -> String {
        self.stored_redirect()
            .unwrap_or_else(|| DEFAULT_REDIRECT.to_string())
    }

    /// The stored redirect target if one is set and still valid.
    pub(crate) fn stored_redirect(&self) -> Option<String> {
        self.store
            .load_redirect()
            .filter(|path| is_allowed_redirect(path))
    }

    /// Return the stored redirect target (or `/`) and forget it.
    pub fn take_pending_redirect(&self) -> String {
        let target = self.pending_redirect();
        if let Err(e) = self.store.clear_redirect() {
            tracing::warn!(error = %e, "Failed to clear redirect target");
        }
        target
    }
}
