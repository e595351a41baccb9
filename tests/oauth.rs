//! Integration tests for the social sign-in round trip.
#![cfg(feature = "oauth")]

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use common::{api_path, harness, harness_with, user_json};
use event_booking_client::{
    CallbackParams, CallbackState, Credentials, Error, MemorySessionStore, Provider, Session,
    SessionStore,
};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

async fn mount_provider(h: &common::Harness, provider: &str, from_url: &str) {
    Mock::given(method("GET"))
        .and(path(api_path(&format!("/auth/{provider}"))))
        .and(query_param("from_url", from_url))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "auth_url": format!("https://accounts.example.com/o/oauth2/auth?provider={provider}")
        })))
        .expect(1)
        .mount(&h.server)
        .await;
}

#[tokio::test]
async fn test_begin_oauth_remembers_current_path() {
    let h = harness().await;
    mount_provider(&h, "google", "/events/42").await;

    let url = h
        .client
        .auth()
        .begin_oauth(Provider::Google, Some("/events/42"))
        .await
        .unwrap();
    assert_eq!(url.host_str(), Some("accounts.example.com"));
    assert_eq!(h.client.session().pending_redirect(), "/events/42");
}

#[tokio::test]
async fn test_begin_oauth_falls_back_to_stored_redirect() {
    let h = harness().await;
    h.client.session().set_pending_redirect("/checkout");
    mount_provider(&h, "facebook", "/checkout").await;

    h.client
        .auth()
        .begin_oauth(Provider::Facebook, Some("/login"))
        .await
        .unwrap();
    assert_eq!(h.client.session().pending_redirect(), "/checkout");
}

#[tokio::test]
async fn test_begin_oauth_defaults_to_home() {
    let h = harness().await;
    mount_provider(&h, "google", "/").await;

    h.client
        .auth()
        .begin_oauth(Provider::Google, Some("/auth/callback"))
        .await
        .unwrap();
    assert_eq!(h.client.session().pending_redirect(), "/");
}

#[tokio::test]
async fn test_full_round_trip_lands_on_saved_page() {
    let h = harness().await;
    mount_provider(&h, "google", "/my-tickets").await;

    let decision = h.client.guard().enter("/my-tickets");
    assert!(matches!(
        decision,
        event_booking_client::GuardDecision::RedirectToLogin { .. }
    ));
    h.client
        .auth()
        .begin_oauth(Provider::Google, None)
        .await
        .unwrap();

    let user = urlencoding::encode(&user_json().to_string()).into_owned();
    let callback: url::Url = format!("http://app.local/auth/callback?access_token=oauth-tok&user={user}")
        .parse()
        .unwrap();
    let state = h
        .client
        .auth()
        .complete_oauth(&CallbackParams::from_url(&callback));

    assert_eq!(
        state,
        CallbackState::Success {
            redirect_to: "/my-tickets".into()
        }
    );
    assert_eq!(h.client.session().token().unwrap().as_str(), "oauth-tok");
    assert_eq!(h.navigator.paths(), vec!["/login", "/my-tickets"]);
}

/// Memory store that counts how often credentials are written.
struct CountingStore {
    inner: MemorySessionStore,
    saves: Arc<AtomicUsize>,
}

impl SessionStore for CountingStore {
    fn load(&self) -> Session {
        self.inner.load()
    }

    fn save(&self, credentials: &Credentials) -> Result<(), Error> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.inner.save(credentials)
    }

    fn clear(&self) -> Result<(), Error> {
        self.inner.clear()
    }

    fn load_redirect(&self) -> Option<String> {
        self.inner.load_redirect()
    }

    fn save_redirect(&self, path: &str) -> Result<(), Error> {
        self.inner.save_redirect(path)
    }

    fn clear_redirect(&self) -> Result<(), Error> {
        self.inner.clear_redirect()
    }
}

#[tokio::test]
async fn test_concurrent_duplicate_callbacks_save_once() {
    let saves = Arc::new(AtomicUsize::new(0));
    let store = CountingStore {
        inner: MemorySessionStore::new(),
        saves: Arc::clone(&saves),
    };
    let h = harness_with(store, |c| c).await;
    h.client.session().set_pending_redirect("/checkout");

    let user = urlencoding::encode(&user_json().to_string()).into_owned();
    let params = CallbackParams::from_query(&format!("access_token=oauth-tok&user={user}"));

    let states: Vec<CallbackState> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| h.client.auth().complete_oauth(&params)))
            .collect();
        handles.into_iter().map(|handle| handle.join().unwrap()).collect()
    });

    let expected = CallbackState::Success {
        redirect_to: "/checkout".into(),
    };
    assert!(states.iter().all(|state| *state == expected), "{states:?}");
    assert_eq!(saves.load(Ordering::SeqCst), 1);
    assert_eq!(h.navigator.paths(), vec!["/checkout"]);
    assert_eq!(h.client.session().token().unwrap().as_str(), "oauth-tok");
}
