//! Client session: persistence, shared context and redirect bookkeeping.
//!
//! ```rust,ignore
//! use event_booking_client::session::{MemorySessionStore, SessionContext};
//!
//! let ctx = Arc::new(SessionContext::init(MemorySessionStore::new()));
//! ctx.set_pending_redirect("/events/42");
//! ```

mod context;
#[cfg(feature = "file-store")]
mod file;
mod memory;
mod redirect;
mod traits;
mod types;

pub use context::SessionContext;
#[cfg(feature = "file-store")]
pub use file::FileSessionStore;
pub use memory::MemorySessionStore;
pub use redirect::{DEFAULT_REDIRECT, is_allowed_redirect};
pub use traits::SessionStore;
pub use types::{Credentials, Session};
