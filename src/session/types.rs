use serde::{Deserialize, Serialize};

use crate::types::{AccessToken, User};

/// Token and user of an authenticated session.
///
/// The pair is only ever stored, replaced or removed as a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    pub token: AccessToken,
    pub user: User,
}

impl Credentials {
    #[must_use]
    pub fn new(token: AccessToken, user: User) -> Self {
        Self { token, user }
    }
}

/// Client-side session: either fully authenticated or empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    credentials: Option<Credentials>,
}

impl Session {
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn authenticated(credentials: Credentials) -> Self {
        Self {
            credentials: Some(credentials),
        }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.credentials.is_some()
    }

    #[must_use]
    pub fn token(&self) -> Option<&AccessToken> {
        self.credentials.as_ref().map(|c| &c.token)
    }

    #[must_use]
    pub fn user(&self) -> Option<&User> {
        self.credentials.as_ref().map(|c| &c.user)
    }

    #[must_use]
    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }
}
