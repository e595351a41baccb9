//! Email/password authentication and account maintenance.
//!
//! Every successful sign-in goes through [`SessionContext::establish`], so
//! the token and user are persisted together or not at all.

use std::sync::Arc;

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;
use crate::http::{self, ApiClient, OnUnauthorized};
use crate::session::{Credentials, SessionContext};
use crate::types::{AccessToken, User};
use crate::validation::{MIN_PASSWORD_LEN, Validator};

/// New account details for [`AuthFlow::register`].
#[derive(Clone, Serialize)]
pub struct RegisterRequest {
    pub full_name: String,
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

impl std::fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("full_name", &self.full_name)
            .field("email", &self.email)
            .field("phone_number", &self.phone_number)
            .finish_non_exhaustive()
    }
}

impl RegisterRequest {
    #[must_use]
    pub fn new(
        full_name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            full_name: full_name.into(),
            email: email.into(),
            password: password.into(),
            phone_number: None,
        }
    }

    #[must_use]
    pub fn with_phone_number(mut self, phone: impl Into<String>) -> Self {
        self.phone_number = Some(phone.into());
        self
    }

    fn validate(&self) -> Result<(), Error> {
        Validator::new()
            .require(&self.full_name, "full_name", "Full name is required")
            .email(&self.email, "email")
            .check(
                self.password.chars().count() >= MIN_PASSWORD_LEN,
                "password",
                "Password must be at least 8 characters",
            )
            .finish()
    }
}

/// Result of a registration.
#[derive(Debug, Clone, PartialEq)]
pub enum Registration {
    /// The API issued a token; the session is established.
    SignedIn(User),
    /// The account exists but the user still has to sign in.
    Created(User),
}

impl Registration {
    #[must_use]
    pub fn user(&self) -> &User {
        match self {
            Self::SignedIn(user) | Self::Created(user) => user,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogoutOutcome {
    /// Whether the API confirmed the token was revoked.
    pub remote_invalidated: bool,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AuthResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    user: Option<User>,
}

/// Sign-in, sign-out and account flows over the shared session.
///
/// OAuth lives in [`crate::oauth`] as further methods on this type.
#[derive(Debug, Clone)]
pub struct AuthFlow {
    pub(crate) api: ApiClient,
    #[cfg(feature = "oauth")]
    pub(crate) callbacks: Arc<parking_lot::Mutex<crate::oauth::CallbackLedger>>,
}

impl AuthFlow {
    #[must_use]
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            #[cfg(feature = "oauth")]
            callbacks: Arc::default(),
        }
    }

    #[must_use]
    pub fn session(&self) -> &Arc<SessionContext> {
        self.api.session()
    }

    /// Sign in with email and password.
    ///
    /// Input is checked locally first; a rejected form never reaches the
    /// network.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] for an empty password or malformed email.
    /// - [`Error::Unauthorized`] for wrong credentials, carrying the server's
    ///   message.
    /// - [`Error::Store`] if the session could not be persisted.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, Error> {
        let email = email.trim();
        Validator::new()
            .email(email, "email")
            .check(!password.is_empty(), "password", "Password is required")
            .finish()?;

        tracing::info!("Signing in");
        let response: AuthResponse = self
            .api
            .post_json("login", "/auth/login", &LoginRequest { email, password })
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "Sign-in failed"))?;
        self.adopt("login", response).await
    }

    /// Create an account.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] for missing name, malformed email or a short
    /// password; otherwise as [`login`](Self::login).
    pub async fn register(&self, request: &RegisterRequest) -> Result<Registration, Error> {
        request.validate()?;

        tracing::info!("Registering account");
        let body: Value = self
            .api
            .post_json("register", "/auth/register", request)
            .await?;

        if body.get("access_token").is_some_and(|t| !t.is_null()) {
            let response: AuthResponse = decode_value("register", body)?;
            return self.adopt("register", response).await.map(Registration::SignedIn);
        }
        let user: User = match body.get("user") {
            Some(user) => decode_value("register", user.clone())?,
            None => decode_value("register", body)?,
        };
        Ok(Registration::Created(user))
    }

    /// Turn an auth response into an established session.
    ///
    /// Fetches the user with the new token when the response lacks one.
    /// Nothing is persisted unless both parts are in hand.
    pub(crate) async fn adopt(&self, operation: &'static str, response: AuthResponse) -> Result<User, Error> {
        let token = response
            .access_token
            .filter(|t| !t.is_empty())
            .map(AccessToken::new)
            .ok_or_else(|| Error::Decode {
                operation,
                detail: "response has no access_token".into(),
            })?;

        let user = match response.user {
            Some(user) => user,
            None => self.fetch_user(&token).await?,
        };
        self.session()
            .establish(Credentials::new(token, user.clone()))?;
        Ok(user)
    }

    async fn fetch_user(&self, token: &AccessToken) -> Result<User, Error> {
        let builder = self.api.request_with_token(Method::GET, "/auth/me", token)?;
        let response = self.api.send("fetch current user", builder).await?;
        http::decode("fetch current user", response).await
    }

    /// Sign out. Always leaves the session cleared.
    ///
    /// The remote call is skipped without a token. Its failure is logged, not
    /// returned; an already expired token (401) clears locally without
    /// redirecting.
    pub async fn logout(&self) -> LogoutOutcome {
        let session = self.session();
        let mut remote_invalidated = false;

        if session.is_authenticated() {
            let sent = match self.api.request(Method::POST, "/auth/logout") {
                Ok(builder) => {
                    self.api
                        .send_with("logout", builder, OnUnauthorized::ClearOnly)
                        .await
                }
                Err(e) => Err(e),
            };
            match sent {
                Ok(_) => remote_invalidated = true,
                Err(Error::Unauthorized { .. }) => {
                    tracing::debug!("Token already expired at logout");
                }
                Err(e) => tracing::warn!(error = %e, "Remote logout failed; clearing locally"),
            }
        }

        session.clear();
        LogoutOutcome { remote_invalidated }
    }

    /// Refresh the signed-in user from the API.
    ///
    /// Returns `None` without a token, or when the API rejects the token (the
    /// session is cleared in that case).
    ///
    /// # Errors
    ///
    /// Transport and non-401 API errors.
    pub async fn current_user(&self) -> Result<Option<User>, Error> {
        let Some(token) = self.session().token() else {
            return Ok(None);
        };
        match self.fetch_user(&token).await {
            Ok(user) => {
                self.session().refresh_user(&token, user.clone())?;
                Ok(Some(user))
            }
            Err(Error::Unauthorized { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Ask the API to (re)send the signed-in user's verification email.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`ApiClient`].
    pub async fn send_verification_email(&self) -> Result<(), Error> {
        self.api
            .post_discard(
                "send verification email",
                "/auth/send-verification-email",
                &serde_json::json!({}),
            )
            .await
    }

    /// # Errors
    ///
    /// [`Error::Validation`] for an empty token; API errors otherwise.
    pub async fn verify_email(&self, token: &str) -> Result<(), Error> {
        Validator::new()
            .require(token, "token", "Verification token is missing")
            .finish()?;
        self.api
            .post_discard(
                "verify email",
                "/auth/verify-email",
                &serde_json::json!({ "token": token.trim() }),
            )
            .await
    }

    /// # Errors
    ///
    /// [`Error::Validation`] for a malformed email; API errors otherwise.
    pub async fn request_password_reset(&self, email: &str) -> Result<(), Error> {
        let email = email.trim();
        Validator::new().email(email, "email").finish()?;
        tracing::info!("Requesting password reset");
        self.api
            .post_discard(
                "request password reset",
                "/auth/reset-password",
                &serde_json::json!({ "email": email }),
            )
            .await
    }

    /// # Errors
    ///
    /// [`Error::Validation`] for a missing token or a short password.
    pub async fn confirm_password_reset(&self, token: &str, new_password: &str) -> Result<(), Error> {
        Validator::new()
            .require(token, "token", "Reset token is missing")
            .check(
                new_password.chars().count() >= MIN_PASSWORD_LEN,
                "password",
                "Password must be at least 8 characters",
            )
            .finish()?;
        self.api
            .post_discard(
                "confirm password reset",
                "/auth/reset-password/confirm",
                &serde_json::json!({ "token": token.trim(), "newPassword": new_password }),
            )
            .await
    }
}

fn decode_value<T: serde::de::DeserializeOwned>(operation: &'static str, value: Value) -> Result<T, Error> {
    serde_json::from_value(value).map_err(|e| Error::Decode {
        operation,
        detail: e.to_string(),
    })
}
