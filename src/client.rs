use std::sync::Arc;

use crate::auth::AuthFlow;
use crate::config::ClientConfig;
use crate::error::Error;
use crate::events::{EventFilter, EventService};
use crate::http::ApiClient;
use crate::navigation::Navigator;
use crate::payments::PaymentService;
use crate::routes::RouteGuard;
use crate::search::DebouncedSearch;
use crate::session::{SessionContext, SessionStore};
use crate::tickets::TicketService;

/// Everything a front-end needs, wired around one shared session.
///
/// ```rust,ignore
/// let client = EventClient::new(ClientConfig::from_env()?, MemorySessionStore::new(), router)?;
/// let page = client.events().list(&EventFilter::new()).await?;
/// ```
#[derive(Debug, Clone)]
pub struct EventClient {
    config: ClientConfig,
    api: ApiClient,
    auth: AuthFlow,
    guard: RouteGuard,
    events: EventService,
    tickets: TicketService,
    payments: PaymentService,
}

impl EventClient {
    /// Load the session from `store` and build the services.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the HTTP client cannot be built.
    pub fn new(
        config: ClientConfig,
        store: impl SessionStore,
        navigator: impl Navigator,
    ) -> Result<Self, Error> {
        let session = Arc::new(SessionContext::init(store));
        Self::with_session(config, session, Arc::new(navigator))
    }

    /// Build around an existing session context.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the HTTP client cannot be built.
    pub fn with_session(
        config: ClientConfig,
        session: Arc<SessionContext>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, Error> {
        let api = ApiClient::new(&config, Arc::clone(&session), Arc::clone(&navigator))?;
        let guard = RouteGuard::new(session, navigator, config.login_path.clone());
        let events = EventService::new(api.clone(), config.featured_page_size);
        let tickets = TicketService::new(api.clone(), events.clone());
        let payments = PaymentService::new(
            api.clone(),
            config.payment_poll_interval,
            config.payment_poll_attempts,
        );
        tracing::debug!(api_url = %config.api_url, "Event client ready");

        Ok(Self {
            auth: AuthFlow::new(api.clone()),
            config,
            api,
            guard,
            events,
            tickets,
            payments,
        })
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    #[must_use]
    pub fn session(&self) -> &Arc<SessionContext> {
        self.api.session()
    }

    /// The raw adapter, for endpoints without a dedicated service.
    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    #[must_use]
    pub fn auth(&self) -> &AuthFlow {
        &self.auth
    }

    #[must_use]
    pub fn guard(&self) -> &RouteGuard {
        &self.guard
    }

    #[must_use]
    pub fn events(&self) -> &EventService {
        &self.events
    }

    #[must_use]
    pub fn tickets(&self) -> &TicketService {
        &self.tickets
    }

    #[must_use]
    pub fn payments(&self) -> &PaymentService {
        &self.payments
    }

    /// A fresh search box over `base`, debounced per configuration.
    #[must_use]
    pub fn search(&self, base: EventFilter) -> DebouncedSearch {
        DebouncedSearch::new(self.events.clone(), base, self.config.search_debounce)
    }
}
