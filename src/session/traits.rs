use super::types::{Credentials, Session};
use crate::error::Error;

/// Persistence boundary for the client session.
///
/// Implementations do no validation and no network I/O. Expected conditions
/// (nothing stored, unreadable or malformed data) surface as an anonymous
/// [`Session`] from [`load`](SessionStore::load), never as an error.
///
/// # Example
///
/// ```rust,ignore
/// impl SessionStore for BrowserStorage {
///     fn load(&self) -> Session {
///         match (self.get("token"), self.get("user")) {
///             (Some(token), Some(user)) => /* parse */,
///             _ => Session::anonymous(),
///         }
///     }
///     // ...
/// }
/// ```
pub trait SessionStore: Send + Sync + 'static {
    /// Read the persisted session.
    fn load(&self) -> Session;

    /// Persist token and user together.
    fn save(&self, credentials: &Credentials) -> Result<(), Error>;

    /// Remove token and user.
    fn clear(&self) -> Result<(), Error>;

    /// Read the stored redirect target, if any.
    fn load_redirect(&self) -> Option<String>;

    /// Store the redirect target. Callers have already validated `path`.
    fn save_redirect(&self, path: &str) -> Result<(), Error>;

    /// Remove the redirect target.
    fn clear_redirect(&self) -> Result<(), Error>;
}
