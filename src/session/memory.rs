use parking_lot::Mutex;

use super::traits::SessionStore;
use super::types::{Credentials, Session};
use crate::error::Error;

#[derive(Debug, Default)]
struct Stored {
    credentials: Option<Credentials>,
    redirect: Option<String>,
}

/// Process-local session store.
///
/// Nothing survives a restart; suited to tests and short-lived hosts.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    inner: Mutex<Stored>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with an authenticated session already stored.
    #[must_use]
    pub fn with_credentials(credentials: Credentials) -> Self {
        Self {
            inner: Mutex::new(Stored {
                credentials: Some(credentials),
                redirect: None,
            }),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Session {
        self.inner
            .lock()
            .credentials
            .clone()
            .map_or_else(Session::anonymous, Session::authenticated)
    }

    fn save(&self, credentials: &Credentials) -> Result<(), Error> {
        self.inner.lock().credentials = Some(credentials.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), Error> {
        self.inner.lock().credentials = None;
        Ok(())
    }

    fn load_redirect(&self) -> Option<String> {
        self.inner.lock().redirect.clone()
    }

    fn save_redirect(&self, path: &str) -> Result<(), Error> {
        self.inner.lock().redirect = Some(path.to_owned());
        Ok(())
    }

    fn clear_redirect(&self) -> Result<(), Error> {
        self.inner.lock().redirect = None;
        Ok(())
    }
}
