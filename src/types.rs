//! Identifiers and shared response shapes.
//!
//! # Defaulting rules
//!
//! The API is loose about optional fields. Instead of patching responses at
//! every call site, the rules live on the types:
//!
//! - Identifiers accept both `id` and `_id`.
//! - [`User::full_name`] accepts `full_name` or `name`; missing becomes empty.
//! - Boolean flags default to `false`, except [`User::is_active`] (`true`).
//! - Unknown user fields are kept in [`User::extra`] so a persisted user
//!   round-trips unchanged.
//! - [`Page`] items may be named `items`, `events` or `tickets`; a missing
//!   `page` means page 1.
//! - Timestamps are RFC 3339 or naive ISO-8601 (taken as UTC). Anything else
//!   becomes `None` and is logged.

use derive_more::{Display, From, FromStr, Into};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Backend user identifier (opaque string).
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, FromStr, From, Into,
)]
#[serde(transparent)]
pub struct UserId(pub String);

/// Event identifier (opaque string).
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, FromStr, From, Into,
)]
#[serde(transparent)]
pub struct EventId(pub String);

/// Purchased ticket identifier.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, FromStr, From, Into,
)]
#[serde(transparent)]
pub struct TicketId(pub String);

/// Ticket type identifier. The API keys ticket types by name.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, FromStr,
    From, Into,
)]
#[serde(transparent)]
pub struct TicketTypeId(pub String);

impl From<&str> for TicketTypeId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Payment gateway reference used to verify a payment.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, FromStr, From, Into,
)]
#[serde(transparent)]
pub struct PaymentReference(pub String);

/// Bearer token issued by the API.
///
/// `Debug` only reveals the length so tokens never end up in logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, From, Into)]
#[serde(transparent)]
pub struct AccessToken(String);

impl AccessToken {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AccessToken(len={})", self.0.len())
    }
}

/// Authenticated user as returned by the auth endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default, alias = "_id")]
    pub id: UserId,
    #[serde(default)]
    pub email: String,
    #[serde(default, alias = "name")]
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Fields this crate does not model.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl User {
    /// Create a user with only the identifying fields set.
    #[must_use]
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: UserId(id.into()),
            email: email.into(),
            full_name: String::new(),
            phone_number: None,
            is_admin: false,
            is_verified: false,
            is_active: true,
            extra: Map::new(),
        }
    }

    #[must_use]
    pub fn with_full_name(mut self, name: impl Into<String>) -> Self {
        self.full_name = name.into();
        self
    }

    /// Name to greet the user with, falling back to the email address.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.full_name.is_empty() {
            &self.email
        } else {
            &self.full_name
        }
    }
}

fn default_true() -> bool {
    true
}

/// One page of a paginated listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    #[serde(alias = "events", alias = "tickets")]
    pub items: Vec<T>,
    #[serde(default)]
    pub total: u64,
    #[serde(default = "first_page")]
    pub page: u32,
    #[serde(default)]
    pub size: u32,
}

fn first_page() -> u32 {
    1
}

impl<T> Page<T> {
    /// Number of pages implied by `total` and `size`.
    #[must_use]
    pub fn total_pages(&self) -> u32 {
        if self.size == 0 {
            return u32::from(self.total > 0);
        }
        let pages = self.total.div_ceil(u64::from(self.size));
        u32::try_from(pages).unwrap_or(u32::MAX)
    }

    #[must_use]
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    #[must_use]
    pub fn next_page(&self) -> Option<u32> {
        self.has_next().then(|| self.page + 1)
    }

    /// Transform the items, keeping pagination metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            size: self.size,
        }
    }
}

/// Lenient timestamp (de)serialization for `Option<OffsetDateTime>` fields.
pub(crate) mod timestamp {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::format_description::well_known::{Iso8601, Rfc3339};
    use time::{OffsetDateTime, PrimitiveDateTime};

    pub(crate) fn parse(raw: &str) -> Option<OffsetDateTime> {
        OffsetDateTime::parse(raw, &Rfc3339).ok().or_else(|| {
            PrimitiveDateTime::parse(raw, &Iso8601::DEFAULT)
                .ok()
                .map(PrimitiveDateTime::assume_utc)
        })
    }

    pub(crate) fn deserialize<'de, D>(deserializer: D) -> Result<Option<OffsetDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.and_then(|s| {
            let parsed = parse(&s);
            if parsed.is_none() {
                tracing::warn!(value = %s, "Ignoring unparseable timestamp");
            }
            parsed
        }))
    }

    pub(crate) fn serialize<S>(value: &Option<OffsetDateTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        time::serde::rfc3339::option::serialize(value, serializer)
    }
}
