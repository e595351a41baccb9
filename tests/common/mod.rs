#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use event_booking_client::{
    AccessToken, ClientConfig, Credentials, EventClient, MemorySessionStore, Navigation,
    SessionStore, User,
};
use parking_lot::Mutex;
use wiremock::MockServer;

pub const API_PREFIX: &str = "/api/v1";

/// Records every navigation request instead of routing.
#[derive(Clone, Default)]
pub struct RecordingNavigator {
    seen: Arc<Mutex<Vec<Navigation>>>,
}

impl RecordingNavigator {
    pub fn navigations(&self) -> Vec<Navigation> {
        self.seen.lock().clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.seen.lock().iter().map(|n| n.path.clone()).collect()
    }
}

impl event_booking_client::Navigator for RecordingNavigator {
    fn navigate(&self, to: Navigation) {
        self.seen.lock().push(to);
    }
}

pub struct Harness {
    pub server: MockServer,
    pub client: EventClient,
    pub navigator: RecordingNavigator,
}

pub fn api_path(path: &str) -> String {
    format!("{API_PREFIX}{path}")
}

pub fn config_for(server: &MockServer) -> ClientConfig {
    ClientConfig::new(format!("{}{API_PREFIX}", server.uri()).parse().unwrap())
        .with_request_timeout(Duration::from_secs(5))
        .with_payment_poll_interval(Duration::from_millis(20))
        .with_payment_poll_attempts(5)
        .with_search_debounce(Duration::from_millis(50))
}

pub async fn harness() -> Harness {
    harness_with(MemorySessionStore::new(), |c| c).await
}

pub async fn signed_in_harness() -> Harness {
    harness_with(signed_in_store("stored-token"), |c| c).await
}

pub async fn harness_with(
    store: impl SessionStore,
    configure: impl FnOnce(ClientConfig) -> ClientConfig,
) -> Harness {
    let server = MockServer::start().await;
    let navigator = RecordingNavigator::default();
    let client = EventClient::new(configure(config_for(&server)), store, navigator.clone()).unwrap();
    Harness {
        server,
        client,
        navigator,
    }
}

pub fn user_json() -> serde_json::Value {
    serde_json::json!({
        "id": "u1",
        "email": "ann@example.com",
        "full_name": "Ann Wanjiru",
        "is_verified": true
    })
}

pub fn signed_in_store(token: &str) -> MemorySessionStore {
    MemorySessionStore::with_credentials(Credentials::new(
        AccessToken::new(token),
        User::new("u1", "ann@example.com").with_full_name("Ann Wanjiru"),
    ))
}

pub fn event_json(id: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "title": format!("Event {id}"),
        "category": "concert",
        "venue": "KICC",
        "start_date": "2024-03-01T18:30:00Z",
        "ticket_types": [
            {"name": "Regular", "price": 1500.0, "quantity": 100},
            {"name": "VIP", "price": 5000.0, "quantity": 10, "quantity_available": 2}
        ]
    })
}
