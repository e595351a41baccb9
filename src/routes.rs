//! Application route table and the authentication guard in front of it.

use std::sync::Arc;

use crate::navigation::{Navigation, Navigator};
use crate::session::SessionContext;
use crate::types::EventId;

/// A view of the application.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Route {
    Home,
    Events,
    EventDetails(EventId),
    Checkout,
    PaymentPending,
    PaymentSuccess,
    PaymentFailed,
    MyTickets,
    Login,
    Register,
    AuthCallback,
    Contact,
    Help,
    Terms,
    Privacy,
    NotFound,
}

impl Route {
    /// Match a path (query and fragment ignored).
    ///
    /// Only rooted paths match a view; `"checkout"` is [`Route::NotFound`].
    /// An empty path is the home view.
    #[must_use]
    pub fn parse(path: &str) -> Self {
        let end = path.find(['?', '#']).unwrap_or(path.len());
        let path = &path[..end];
        if !path.is_empty() && !path.starts_with('/') {
            return Self::NotFound;
        }
        let trimmed = path.trim_end_matches('/');
        let segments: Vec<&str> = trimmed.split('/').skip(1).collect();

        match segments.as_slice() {
            [] => Self::Home,
            ["events"] => Self::Events,
            ["events", id] if !id.is_empty() => Self::EventDetails(EventId(
                urlencoding::decode(id).map_or_else(|_| (*id).to_string(), |s| s.into_owned()),
            )),
            ["checkout"] => Self::Checkout,
            ["payment-pending"] => Self::PaymentPending,
            ["payment-success"] => Self::PaymentSuccess,
            ["payment-failed"] => Self::PaymentFailed,
            ["my-tickets"] => Self::MyTickets,
            ["login"] => Self::Login,
            ["register"] => Self::Register,
            ["auth", "callback"] => Self::AuthCallback,
            ["contact"] => Self::Contact,
            ["help"] => Self::Help,
            ["terms"] => Self::Terms,
            ["privacy"] => Self::Privacy,
            _ => Self::NotFound,
        }
    }

    #[must_use]
    pub fn path(&self) -> String {
        match self {
            Self::EventDetails(id) => format!("/events/{}", urlencoding::encode(&id.0)),
            other => other.static_path().to_string(),
        }
    }

    fn static_path(&self) -> &'static str {
        match self {
            Self::Home => "/",
            Self::Events => "/events",
            Self::Checkout => "/checkout",
            Self::PaymentPending => "/payment-pending",
            Self::PaymentSuccess => "/payment-success",
            Self::PaymentFailed => "/payment-failed",
            Self::MyTickets => "/my-tickets",
            Self::Login => "/login",
            Self::Register => "/register",
            Self::AuthCallback => "/auth/callback",
            Self::Contact => "/contact",
            Self::Help => "/help",
            Self::Terms => "/terms",
            Self::Privacy => "/privacy",
            Self::EventDetails(_) | Self::NotFound => "/404",
        }
    }

    /// Views that need a signed-in user.
    #[must_use]
    pub fn requires_auth(&self) -> bool {
        matches!(
            self,
            Self::Checkout
                | Self::PaymentPending
                | Self::PaymentSuccess
                | Self::PaymentFailed
                | Self::MyTickets
        )
    }
}

/// Outcome of checking a navigation target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Render(Route),
    /// Send the user to the login view; `return_to` is where to resume.
    RedirectToLogin { return_to: String },
}

/// Keeps anonymous users out of protected views.
///
/// Synchronous and network-free: it only looks at whether the session holds
/// a token. Token validity is enforced by the API's 401s.
#[derive(Clone)]
pub struct RouteGuard {
    session: Arc<SessionContext>,
    navigator: Arc<dyn Navigator>,
    login_path: String,
}

impl std::fmt::Debug for RouteGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteGuard")
            .field("login_path", &self.login_path)
            .finish_non_exhaustive()
    }
}

impl RouteGuard {
    #[must_use]
    pub fn new(
        session: Arc<SessionContext>,
        navigator: Arc<dyn Navigator>,
        login_path: impl Into<String>,
    ) -> Self {
        Self {
            session,
            navigator,
            login_path: login_path.into(),
        }
    }

    /// Decide without side effects.
    #[must_use]
    pub fn check(&self, path: &str) -> GuardDecision {
        let route = Route::parse(path);
        if route.requires_auth() && self.session.token().is_none() {
            GuardDecision::RedirectToLogin {
                return_to: path.to_string(),
            }
        } else {
            GuardDecision::Render(route)
        }
    }

    /// Decide and act: a blocked entry records `path` as the pending
    /// redirect and replaces the current view with the login view.
    pub fn enter(&self, path: &str) -> GuardDecision {
        let decision = self.check(path);
        if let GuardDecision::RedirectToLogin { return_to } = &decision {
            tracing::debug!(path = %return_to, "Protected route requires login");
            self.session.set_pending_redirect(return_to);
            self.navigator
                .navigate(Navigation::to(self.login_path.clone()).replace());
        }
        decision
    }
}
