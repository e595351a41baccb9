use crate::validation::FieldError;
use crate::selection::SelectionError;

/// Message shown for failures the user can fix by trying again.
pub const RETRY_MESSAGE: &str = "Something went wrong while contacting the server. Please try again.";

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Transport failure: DNS, connect, timeout, TLS, body read.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status other than 401.
    #[error("{operation} failed ({status}): {detail}")]
    Api {
        operation: &'static str,
        status: u16,
        detail: String,
    },

    /// The API answered 401. The session has already been cleared.
    #[error("{operation} unauthorized: {detail}")]
    Unauthorized {
        operation: &'static str,
        detail: String,
    },

    /// The API answered 2xx but the body was not what we expect.
    #[error("invalid {operation} response: {detail}")]
    Decode {
        operation: &'static str,
        detail: String,
    },

    /// Malformed or failed OAuth callback.
    #[error("OAuth callback error: {0}")]
    Callback(String),

    /// Form input rejected before any request was made.
    #[error("invalid input: {}", describe_fields(.0))]
    Validation(Vec<FieldError>),

    #[error(transparent)]
    Selection(#[from] SelectionError),

    /// Session persistence failed.
    #[error("Session store error: {0}")]
    Store(String),

    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether repeating the same request may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::Api { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Text suitable for showing to the end user.
    ///
    /// Transport failures collapse to [`RETRY_MESSAGE`]; server-provided
    /// details are passed through.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Http(_) | Self::Decode { .. } | Self::Store(_) | Self::Config(_) => {
                RETRY_MESSAGE.to_string()
            }
            Self::Api { status, detail, .. } if *status >= 500 || detail.is_empty() => {
                RETRY_MESSAGE.to_string()
            }
            Self::Api { detail, .. } | Self::Unauthorized { detail, .. } => detail.clone(),
            Self::Callback(msg) => msg.clone(),
            Self::Validation(fields) => describe_fields(fields),
            Self::Selection(e) => e.to_string(),
        }
    }
}

fn describe_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
