//! Local form validation. Failures never reach the network.

use crate::error::Error;

/// Minimum password length accepted by the API.
pub const MIN_PASSWORD_LEN: usize = 8;

/// One rejected form field.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    #[must_use]
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Collects every field error of a form before failing.
#[derive(Debug, Default)]
pub(crate) struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Record `message` for `field` unless `ok` holds.
    pub(crate) fn check(&mut self, ok: bool, field: &'static str, message: &str) -> &mut Self {
        if !ok {
            self.errors.push(FieldError::new(field, message));
        }
        self
    }

    pub(crate) fn require(&mut self, value: &str, field: &'static str, message: &str) -> &mut Self {
        self.check(!value.trim().is_empty(), field, message)
    }

    pub(crate) fn email(&mut self, value: &str, field: &'static str) -> &mut Self {
        if value.trim().is_empty() {
            self.check(false, field, "Email is required")
        } else {
            self.check(is_plausible_email(value.trim()), field, "Enter a valid email address")
        }
    }

    pub(crate) fn finish(&mut self) -> Result<(), Error> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(std::mem::take(&mut self.errors)))
        }
    }
}

/// Cheap shape check: `local@domain.tld`, no whitespace.
#[must_use]
pub fn is_plausible_email(s: &str) -> bool {
    if s.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain
            .split_once('.')
            .is_some_and(|(host, _)| !host.is_empty())
        && !domain.ends_with('.')
}
