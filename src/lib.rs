#![doc = include_str!("../README.md")]

pub mod auth;
pub mod checkout;
mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod http;
pub mod navigation;
#[cfg(feature = "oauth")]
pub mod oauth;
pub mod payments;
pub mod routes;
pub mod search;
pub mod selection;
pub mod session;
pub mod tickets;
pub mod types;
pub mod validation;

// Re-exports for convenient access
pub use auth::{AuthFlow, LogoutOutcome, RegisterRequest, Registration};
pub use checkout::{Buyer, Checkout, CheckoutForm, PaymentDetails};
pub use client::EventClient;
pub use config::ClientConfig;
pub use error::Error;
pub use events::{Event, EventCategory, EventFilter, EventService, TicketType};
pub use http::ApiClient;
pub use navigation::{Navigation, Navigator};
#[cfg(feature = "oauth")]
pub use oauth::{CallbackParams, CallbackState, Provider};
pub use payments::{
    Payment, PaymentMethod, PaymentProgress, PaymentRequest, PaymentService, PaymentVerification,
    PaymentWatch,
};
pub use routes::{GuardDecision, Route, RouteGuard};
pub use search::{DebouncedSearch, RequestTracker, SearchState};
pub use selection::{LineItem, SelectionError, TicketSelection};
#[cfg(feature = "file-store")]
pub use session::FileSessionStore;
pub use session::{Credentials, MemorySessionStore, Session, SessionContext, SessionStore};
pub use tickets::{Ticket, TicketService, TicketStatus};
pub use types::{AccessToken, EventId, Page, PaymentReference, TicketId, TicketTypeId, User, UserId};
pub use validation::FieldError;
