use std::time::Duration;

use url::Url;

use crate::error::Error;

const DEFAULT_API_URL: &str = "http://localhost:8000/api/v1";

/// Shortest accepted payment poll period.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Client configuration.
///
/// The API base URL is the only required field and is a constructor
/// parameter. Everything else has a default and a `with_*` override.
///
/// ```rust,ignore
/// let config = ClientConfig::new("https://api.example.com/api/v1".parse()?)
///     .with_request_timeout(Duration::from_secs(10))
///     .with_login_path("/sign-in");
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ClientConfig {
    pub(crate) api_url: Url,
    pub(crate) request_timeout: Duration,
    pub(crate) login_path: String,
    pub(crate) payment_poll_interval: Duration,
    pub(crate) payment_poll_attempts: u32,
    pub(crate) search_debounce: Duration,
    pub(crate) featured_page_size: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL.parse().expect("valid default URL"))
    }
}

impl ClientConfig {
    #[must_use]
    pub fn new(api_url: Url) -> Self {
        Self {
            api_url,
            request_timeout: Duration::from_secs(30),
            login_path: "/login".into(),
            payment_poll_interval: Duration::from_secs(5),
            payment_poll_attempts: 60,
            search_debounce: Duration::from_millis(300),
            featured_page_size: 4,
        }
    }

    /// Build configuration from environment variables.
    ///
    /// # Optional env vars
    /// - `EVENT_API_URL`: API base URL (default `http://localhost:8000/api/v1`)
    /// - `EVENT_API_TIMEOUT_SECS`: request timeout in seconds, at least 1 (default 30)
    /// - `EVENT_LOGIN_PATH`: login view path (default `/login`)
    /// - `EVENT_PAYMENT_POLL_SECS`: payment status poll interval, at least 1 (default 5)
    /// - `EVENT_PAYMENT_POLL_ATTEMPTS`: polls before giving up (default 60)
    /// - `EVENT_SEARCH_DEBOUNCE_MS`: search input quiet period (default 300)
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a variable is set but invalid.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let mut config = match lookup("EVENT_API_URL") {
            Some(raw) => Self::new(
                raw.parse()
                    .map_err(|e| Error::Config(format!("EVENT_API_URL: {e}")))?,
            ),
            None => Self::default(),
        };

        if let Some(secs) = parse_nonzero(&lookup, "EVENT_API_TIMEOUT_SECS")? {
            config = config.with_request_timeout(Duration::from_secs(secs));
        }
        if let Some(path) = lookup("EVENT_LOGIN_PATH") {
            if !path.starts_with('/') {
                return Err(Error::Config(format!(
                    "EVENT_LOGIN_PATH must start with '/': {path}"
                )));
            }
            config = config.with_login_path(path);
        }
        if let Some(secs) = parse_nonzero(&lookup, "EVENT_PAYMENT_POLL_SECS")? {
            config = config.with_payment_poll_interval(Duration::from_secs(secs));
        }
        if let Some(attempts) = parse_number(&lookup, "EVENT_PAYMENT_POLL_ATTEMPTS")? {
            let attempts = u32::try_from(attempts).map_err(|_| {
                Error::Config(format!("EVENT_PAYMENT_POLL_ATTEMPTS out of range: {attempts}"))
            })?;
            config = config.with_payment_poll_attempts(attempts);
        }
        if let Some(ms) = parse_number(&lookup, "EVENT_SEARCH_DEBOUNCE_MS")? {
            config = config.with_search_debounce(Duration::from_millis(ms));
        }

        Ok(config)
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    /// Period between payment status checks. Zero is raised to
    /// [`MIN_POLL_INTERVAL`].
    #[must_use]
    pub fn with_payment_poll_interval(mut self, interval: Duration) -> Self {
        self.payment_poll_interval = interval.max(MIN_POLL_INTERVAL);
        self
    }

    #[must_use]
    pub fn with_payment_poll_attempts(mut self, attempts: u32) -> Self {
        self.payment_poll_attempts = attempts;
        self
    }

    #[must_use]
    pub fn with_search_debounce(mut self, delay: Duration) -> Self {
        self.search_debounce = delay;
        self
    }

    #[must_use]
    pub fn with_featured_page_size(mut self, size: u32) -> Self {
        self.featured_page_size = size;
        self
    }

    /// API base URL.
    #[must_use]
    pub fn api_url(&self) -> &Url {
        &self.api_url
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Path of the login view used for forced redirects.
    #[must_use]
    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    #[must_use]
    pub fn payment_poll_interval(&self) -> Duration {
        self.payment_poll_interval
    }

    #[must_use]
    pub fn payment_poll_attempts(&self) -> u32 {
        self.payment_poll_attempts
    }

    #[must_use]
    pub fn search_debounce(&self) -> Duration {
        self.search_debounce
    }
}

fn parse_number(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<u64>, Error> {
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<u64>()
                .map_err(|e| Error::Config(format!("{key}: {e}")))
        })
        .transpose()
}

fn parse_nonzero(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<u64>, Error> {
    match parse_number(lookup, key)? {
        Some(0) => Err(Error::Config(format!("{key} must be greater than zero"))),
        other => Ok(other),
    }
}
