//! Sign-in against the JSON-file session store.
#![cfg(feature = "file-store")]

mod common;

use common::{api_path, harness_with, user_json};
use event_booking_client::{FileSessionStore, SessionStore};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn test_login_persists_token_and_user_together() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("session.json");
    let h = harness_with(FileSessionStore::new(&file), |c| c).await;

    Mock::given(method("POST"))
        .and(path(api_path("/auth/login")))
        .and(body_json(json!({"email": "ann@example.com", "password": "secret"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "tok-1", "token_type": "bearer", "user": user_json()})),
        )
        .expect(1)
        .mount(&h.server)
        .await;

    let user = h.client.auth().login(" ann@example.com ", "secret").await.unwrap();
    assert_eq!(user.full_name, "Ann Wanjiru");
    assert_eq!(h.client.session().token().unwrap().as_str(), "tok-1");

    let reloaded = FileSessionStore::new(&file).load();
    assert_eq!(reloaded.token().unwrap().as_str(), "tok-1");
    assert_eq!(reloaded.user().unwrap().email, "ann@example.com");
    assert!(h.navigator.navigations().is_empty());
}
