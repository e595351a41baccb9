//! Social sign-in round trip.
//!
//! [`AuthFlow::begin_oauth`] records where to resume and asks the API for the
//! provider's authorization URL. The provider eventually sends the browser to
//! `/auth/callback?access_token=...&user=...`, which the host hands to
//! [`AuthFlow::complete_oauth`].

use std::borrow::Cow;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use url::Url;

use crate::auth::AuthFlow;
use crate::error::Error;
use crate::navigation::Navigation;
use crate::session::{Credentials, DEFAULT_REDIRECT, is_allowed_redirect};
use crate::types::{AccessToken, User};

pub const MISSING_PARAMETERS: &str = "Authentication failed: Missing required parameters";
pub const UNPARSEABLE_USER: &str = "Failed to parse user information";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    Google,
    Facebook,
}

impl Provider {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Facebook => "facebook",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "google" => Ok(Self::Google),
            "facebook" => Ok(Self::Facebook),
            other => Err(Error::Callback(format!("unsupported provider: {other}"))),
        }
    }
}

/// Query parameters of the callback URL. Empty values count as absent.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    pub access_token: Option<String>,
    /// JSON user object, URL-encoded (possibly twice).
    pub user: Option<String>,
    /// Provider-side failure description.
    pub error: Option<String>,
}

impl std::fmt::Debug for CallbackParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackParams")
            .field("access_token", &self.access_token.as_ref().map(|t| t.len()))
            .field("user", &self.user)
            .field("error", &self.error)
            .finish()
    }
}

impl CallbackParams {
    /// Parse a query string, with or without the leading `?`.
    #[must_use]
    pub fn from_query(query: &str) -> Self {
        let mut params = Self::default();
        let query = query.strip_prefix('?').unwrap_or(query);
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            if value.is_empty() {
                continue;
            }
            let slot = match key.as_ref() {
                "access_token" => &mut params.access_token,
                "user" => &mut params.user,
                "error" => &mut params.error,
                _ => continue,
            };
            slot.get_or_insert_with(|| value.into_owned());
        }
        params
    }

    #[must_use]
    pub fn from_url(url: &Url) -> Self {
        Self::from_query(url.query().unwrap_or_default())
    }
}

/// Progress of the callback view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackState {
    Parsing,
    Success { redirect_to: String },
    Error { message: String },
}

/// Last completed callback, so a re-delivered callback is not applied twice.
#[derive(Debug, Default)]
pub(crate) struct CallbackLedger {
    last: Option<Completed>,
}

#[derive(Debug)]
struct Completed {
    fingerprint: String,
    token: AccessToken,
    redirect_to: String,
}

#[derive(Deserialize)]
struct AuthorizationUrl {
    auth_url: Url,
}

impl AuthFlow {
    /// Start a social sign-in and return the provider URL to open.
    ///
    /// The resume target is `current_path` when it is an allowed redirect,
    /// otherwise the stored pending redirect, otherwise `/`. It is stored as
    /// the pending redirect and passed to the API as `from_url`.
    ///
    /// # Errors
    ///
    /// Propagates errors from the authorization URL request.
    pub async fn begin_oauth(&self, provider: Provider, current_path: Option<&str>) -> Result<Url, Error> {
        let session = self.session();
        let target = current_path
            .filter(|path| is_allowed_redirect(path))
            .map(str::to_string)
            .or_else(|| session.stored_redirect())
            .unwrap_or_else(|| DEFAULT_REDIRECT.to_string());
        session.set_pending_redirect(&target);

        tracing::info!(provider = %provider, from_url = %target, "Starting OAuth sign-in");
        let path = format!("/auth/{}", provider.as_str());
        let response: AuthorizationUrl = self
            .api
            .get_json("start oauth", &path, &[("from_url", target)])
            .await?;
        Ok(response.auth_url)
    }

    /// Finish a social sign-in from the callback parameters.
    ///
    /// On success the session is established, the pending redirect consumed
    /// and the host navigated there. On error nothing is persisted, the
    /// pending redirect is kept, and the host is sent to the login view with
    /// the message.
    ///
    /// Delivering the same callback again while its session is still held
    /// returns the same success without saving or navigating.
    pub fn complete_oauth(&self, params: &CallbackParams) -> CallbackState {
        if let Some(error) = &params.error {
            tracing::warn!(error = %error, "OAuth provider reported an error");
            return self.fail_callback(error.clone());
        }
        let (Some(token), Some(raw_user)) = (&params.access_token, &params.user) else {
            tracing::warn!(
                has_token = params.access_token.is_some(),
                has_user = params.user.is_some(),
                "OAuth callback is missing parameters"
            );
            return self.fail_callback(MISSING_PARAMETERS.to_string());
        };

        let user_json = urlencoding::decode(raw_user).map_or(Cow::Borrowed(raw_user.as_str()), |d| d);
        let fingerprint = fingerprint(token, &user_json);
        let token = AccessToken::new(token.as_str());

        let mut ledger = self.callbacks.lock();
        if let Some(done) = &ledger.last {
            if done.fingerprint == fingerprint && self.session().token().as_ref() == Some(&done.token) {
                tracing::debug!("Ignoring repeated OAuth callback");
                return CallbackState::Success {
                    redirect_to: done.redirect_to.clone(),
                };
            }
        }

        let user: User = match serde_json::from_str(&user_json) {
            Ok(user) => user,
            Err(e) => {
                drop(ledger);
                tracing::warn!(error = %e, "OAuth callback user is not valid JSON");
                return self.fail_callback(UNPARSEABLE_USER.to_string());
            }
        };
        if let Err(e) = self
            .session()
            .establish(Credentials::new(token.clone(), user))
        {
            drop(ledger);
            tracing::error!(error = %e, "Failed to persist OAuth session");
            return self.fail_callback(e.user_message());
        }

        let redirect_to = self.session().take_pending_redirect();
        ledger.last = Some(Completed {
            fingerprint,
            token,
            redirect_to: redirect_to.clone(),
        });
        drop(ledger);

        tracing::info!(redirect_to = %redirect_to, "OAuth sign-in complete");
        self.api
            .navigator()
            .navigate(Navigation::to(redirect_to.clone()).replace());
        CallbackState::Success { redirect_to }
    }

    fn fail_callback(&self, message: String) -> CallbackState {
        self.api.navigator().navigate(
            Navigation::to(self.api.login_path())
                .replace()
                .with_error(message.clone()),
        );
        CallbackState::Error { message }
    }
}

fn fingerprint(token: &str, user_json: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.update([0]);
    hasher.update(user_json.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::config::ClientConfig;
    use crate::http::ApiClient;
    use crate::navigation::Navigator;
    use crate::session::{MemorySessionStore, SessionContext};

    const USER: &str = r#"{"id":"u1","email":"ann@example.com","full_name":"Ann"}"#;

    fn flow() -> (AuthFlow, Arc<Mutex<Vec<Navigation>>>) {
        let config = ClientConfig::new("http://127.0.0.1:9/api/v1".parse().unwrap());
        let session = Arc::new(SessionContext::init(MemorySessionStore::new()));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let navigator: Arc<dyn Navigator> = Arc::new(move |n: Navigation| sink.lock().push(n));
        let api = ApiClient::new(&config, session, navigator).unwrap();
        (AuthFlow::new(api), seen)
    }

    fn callback(token: &str, user: &str) -> CallbackParams {
        CallbackParams {
            access_token: Some(token.into()),
            user: Some(user.into()),
            error: None,
        }
    }

    #[test]
    fn parses_query_with_double_encoded_user() {
        let once = urlencoding::encode(USER).into_owned();
        let twice = urlencoding::encode(&once).into_owned();
        let params = CallbackParams::from_query(&format!("?access_token=tok&user={twice}&extra=1"));
        assert_eq!(params.access_token.as_deref(), Some("tok"));
        assert_eq!(params.user.as_deref(), Some(once.as_str()));
        assert_eq!(params.error, None);

        let url: Url = "https://app.example/auth/callback?error=access_denied&access_token="
            .parse()
            .unwrap();
        let params = CallbackParams::from_url(&url);
        assert_eq!(params.error.as_deref(), Some("access_denied"));
        assert_eq!(params.access_token, None);
    }

    #[test]
    fn provider_names() {
        assert_eq!("Google".parse::<Provider>().unwrap(), Provider::Google);
        assert_eq!(Provider::Facebook.to_string(), "facebook");
        assert!("github".parse::<Provider>().is_err());
    }

    #[test]
    fn success_establishes_session_and_consumes_redirect() {
        let (flow, seen) = flow();
        flow.session().set_pending_redirect("/checkout");

        let encoded = urlencoding::encode(USER).into_owned();
        let state = flow.complete_oauth(&callback("tok", &encoded));

        assert_eq!(
            state,
            CallbackState::Success {
                redirect_to: "/checkout".into()
            }
        );
        assert_eq!(flow.session().token().unwrap().as_str(), "tok");
        assert_eq!(flow.session().user().unwrap().full_name, "Ann");
        assert_eq!(flow.session().pending_redirect(), "/");
        assert_eq!(*seen.lock(), vec![Navigation::to("/checkout").replace()]);
    }

    #[test]
    fn repeated_callback_is_applied_once() {
        let (flow, seen) = flow();
        flow.session().set_pending_redirect("/my-tickets");

        let first = flow.complete_oauth(&callback("tok", USER));
        flow.session().set_pending_redirect("/events");
        let second = flow.complete_oauth(&callback("tok", USER));

        assert_eq!(first, second);
        assert_eq!(seen.lock().len(), 1);
        assert_eq!(flow.session().pending_redirect(), "/events");
    }

    #[test]
    fn replay_after_logout_signs_in_again() {
        let (flow, seen) = flow();
        flow.complete_oauth(&callback("tok", USER));
        flow.session().clear();
        let state = flow.complete_oauth(&callback("tok", USER));
        assert!(matches!(state, CallbackState::Success { .. }));
        assert!(flow.session().is_authenticated());
        assert_eq!(seen.lock().len(), 2);
    }

    #[test]
    fn missing_parameters() {
        let (flow, seen) = flow();
        flow.session().set_pending_redirect("/checkout");
        let state = flow.complete_oauth(&CallbackParams {
            access_token: Some("tok".into()),
            ..CallbackParams::default()
        });
        assert_eq!(
            state,
            CallbackState::Error {
                message: MISSING_PARAMETERS.into()
            }
        );
        assert!(!flow.session().is_authenticated());
        assert_eq!(flow.session().pending_redirect(), "/checkout");
        assert_eq!(
            *seen.lock(),
            vec![Navigation::to("/login").replace().with_error(MISSING_PARAMETERS)]
        );
    }

    #[test]
    fn unparseable_user() {
        let (flow, _) = flow();
        let state = flow.complete_oauth(&callback("tok", "%7Bnot-json"));
        assert_eq!(
            state,
            CallbackState::Error {
                message: UNPARSEABLE_USER.into()
            }
        );
        assert!(!flow.session().is_authenticated());
    }

    #[test]
    fn provider_error_wins() {
        let (flow, seen) = flow();
        let mut params = callback("tok", USER);
        params.error = Some("access_denied".into());
        assert_eq!(
            flow.complete_oauth(&params),
            CallbackState::Error {
                message: "access_denied".into()
            }
        );
        assert!(!flow.session().is_authenticated());
        assert_eq!(seen.lock()[0].error.as_deref(), Some("access_denied"));
    }
}
