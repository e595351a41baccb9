//! Authenticated HTTP adapter over the Event Booking REST API.
//!
//! Every request built here carries the session's bearer token, and every
//! response passes through one place that applies the 401 policy: clear the
//! session, then force navigation to the login view. Feature code never
//! handles 401 itself.

use std::sync::Arc;

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::config::ClientConfig;
use crate::error::Error;
use crate::navigation::{Navigation, Navigator};
use crate::session::SessionContext;
use crate::types::AccessToken;

/// What a 401 response does besides clearing the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OnUnauthorized {
    /// Clear the session and send the user to the login view.
    ClearAndRedirect,
    /// Clear the session only. Used by logout, where 401 just means the
    /// token had already expired.
    ClearOnly,
}

/// Shared, cheaply clonable API client.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

struct Inner {
    http: reqwest::Client,
    base_url: Url,
    session: Arc<SessionContext>,
    navigator: Arc<dyn Navigator>,
    login_path: String,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("login_path", &self.inner.login_path)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Create a client using the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the underlying HTTP client cannot be built.
    pub fn new(
        config: &ClientConfig,
        session: Arc<SessionContext>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self::with_http_client(http, config, session, navigator))
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(
        http: reqwest::Client,
        config: &ClientConfig,
        session: Arc<SessionContext>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                http,
                base_url: config.api_url.clone(),
                session,
                navigator,
                login_path: config.login_path.clone(),
            }),
        }
    }

    #[must_use]
    pub fn session(&self) -> &Arc<SessionContext> {
        &self.inner.session
    }

    pub(crate) fn navigator(&self) -> &Arc<dyn Navigator> {
        &self.inner.navigator
    }

    pub(crate) fn login_path(&self) -> &str {
        &self.inner.login_path
    }

    /// Absolute URL for an API path such as `/events/42`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the result is not a valid URL.
    pub fn endpoint(&self, path: &str) -> Result<Url, Error> {
        let base = self.inner.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
            .parse()
            .map_err(|e| Error::Config(format!("invalid endpoint {path}: {e}")))
    }

    /// Start a request carrying the session's bearer token, if any.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the path does not form a valid URL.
    pub fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, Error> {
        let builder = self.inner.http.request(method, self.endpoint(path)?);
        Ok(match self.inner.session.token() {
            Some(token) => builder.bearer_auth(token.as_str()),
            None => builder,
        })
    }

    /// Start a request with an explicit token instead of the session's.
    pub(crate) fn request_with_token(
        &self,
        method: Method,
        path: &str,
        token: &AccessToken,
    ) -> Result<RequestBuilder, Error> {
        Ok(self
            .inner
            .http
            .request(method, self.endpoint(path)?)
            .bearer_auth(token.as_str()))
    }

    /// Send a request and apply the response policy.
    ///
    /// # Errors
    ///
    /// - [`Error::Http`] on transport failure.
    /// - [`Error::Unauthorized`] on 401, after the session was cleared and
    ///   the login view requested.
    /// - [`Error::Api`] on any other non-success status.
    pub async fn send(
        &self,
        operation: &'static str,
        builder: RequestBuilder,
    ) -> Result<Response, Error> {
        self.send_with(operation, builder, OnUnauthorized::ClearAndRedirect)
            .await
    }

    pub(crate) async fn send_with(
        &self,
        operation: &'static str,
        builder: RequestBuilder,
        policy: OnUnauthorized,
    ) -> Result<Response, Error> {
        let response = builder.send().await.map_err(|e| {
            tracing::warn!(operation, error = %e, "API request failed");
            Error::Http(e)
        })?;

        let status = response.status();
        tracing::debug!(operation, status = status.as_u16(), "API response");

        if status == StatusCode::UNAUTHORIZED {
            let detail = error_detail(response).await;
            self.handle_unauthorized(operation, policy);
            return Err(Error::Unauthorized { operation, detail });
        }
        if !status.is_success() {
            let detail = error_detail(response).await;
            return Err(Error::Api {
                operation,
                status: status.as_u16(),
                detail,
            });
        }
        Ok(response)
    }

    fn handle_unauthorized(&self, operation: &'static str, policy: OnUnauthorized) {
        tracing::warn!(operation, "API rejected credentials; clearing session");
        self.inner.session.clear();
        if policy == OnUnauthorized::ClearAndRedirect {
            self.inner
                .navigator
                .navigate(Navigation::to(self.inner.login_path.clone()).replace());
        }
    }

    /// `GET` a JSON resource.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send); additionally [`Error::Decode`] if the body
    /// is not the expected JSON.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, Error> {
        let builder = self.request(Method::GET, path)?.query(query);
        let response = self.send(operation, builder).await?;
        decode(operation, response).await
    }

    /// `POST` a JSON body and decode the JSON response.
    ///
    /// # Errors
    ///
    /// See [`get_json`](Self::get_json).
    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        operation: &'static str,
        path: &str,
        body: &B,
    ) -> Result<T, Error> {
        let builder = self.request(Method::POST, path)?.json(body);
        let response = self.send(operation, builder).await?;
        decode(operation, response).await
    }

    /// `POST` a JSON body and ignore whatever comes back.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn post_discard<B: Serialize + ?Sized>(
        &self,
        operation: &'static str,
        path: &str,
        body: &B,
    ) -> Result<(), Error> {
        let builder = self.request(Method::POST, path)?.json(body);
        self.send(operation, builder).await.map(drop)
    }
}

/// Decode a success response body as JSON.
pub(crate) async fn decode<T: DeserializeOwned>(
    operation: &'static str,
    response: Response,
) -> Result<T, Error> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| {
        tracing::warn!(operation, error = %e, "Unexpected response body");
        Error::Decode {
            operation,
            detail: e.to_string(),
        }
    })
}

async fn error_detail(response: Response) -> String {
    let body = response.text().await.unwrap_or_default();
    detail_from_body(&body)
}

/// Pull a human-readable message out of an error body.
///
/// The API reports errors as `{"detail": "..."}`, or for validation errors
/// `{"detail": [{"msg": "..."}, ...]}`.
fn detail_from_body(body: &str) -> String {
    let Ok(json) = serde_json::from_str::<Value>(body) else {
        return body.trim().to_string();
    };
    match json.get("detail").or_else(|| json.get("message")) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.get("msg")
                    .and_then(Value::as_str)
                    .map_or_else(|| item.to_string(), str::to_string)
            })
            .collect::<Vec<_>>()
            .join("; "),
        Some(other) => other.to_string(),
        None => body.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemorySessionStore;

    fn client(base: &str) -> ApiClient {
        let config = ClientConfig::new(base.parse().unwrap());
        let session = Arc::new(SessionContext::init(MemorySessionStore::new()));
        let navigator: Arc<dyn Navigator> = Arc::new(|_: Navigation| {});
        ApiClient::new(&config, session, navigator).unwrap()
    }

    #[test]
    fn endpoint_joins_base_path() {
        let api = client("http://localhost:8000/api/v1");
        assert_eq!(
            api.endpoint("/events/42").unwrap().as_str(),
            "http://localhost:8000/api/v1/events/42"
        );
        let api = client("http://localhost:8000/api/v1/");
        assert_eq!(
            api.endpoint("auth/login").unwrap().as_str(),
            "http://localhost:8000/api/v1/auth/login"
        );
    }

    #[test]
    fn detail_string() {
        assert_eq!(
            detail_from_body(r#"{"detail":"Incorrect email or password"}"#),
            "Incorrect email or password"
        );
    }

    #[test]
    fn detail_validation_list() {
        let body = r#"{"detail":[{"loc":["body","email"],"msg":"field required"},{"msg":"too short"}]}"#;
        assert_eq!(detail_from_body(body), "field required; too short");
    }

    #[test]
    fn detail_falls_back_to_body() {
        assert_eq!(detail_from_body("Bad Gateway\n"), "Bad Gateway");
        assert_eq!(detail_from_body(r#"{"message":"nope"}"#), "nope");
        assert_eq!(detail_from_body(r#"{"error":"x"}"#), r#"{"error":"x"}"#);
    }
}
