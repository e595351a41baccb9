//! Navigation requests handed to the host's router.

/// A request to show another view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    /// Application path, e.g. `/events/42`.
    pub path: String,
    /// Message for the target view to display (login errors).
    pub error: Option<String>,
    /// Replace the current history entry instead of pushing.
    pub replace: bool,
}

impl Navigation {
    #[must_use]
    pub fn to(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            error: None,
            replace: false,
        }
    }

    #[must_use]
    pub fn replace(mut self) -> Self {
        self.replace = true;
        self
    }

    #[must_use]
    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self
    }
}

/// Host-provided router.
///
/// Called synchronously from whichever task triggered the navigation; an
/// implementation should only enqueue the change.
pub trait Navigator: Send + Sync + 'static {
    fn navigate(&self, to: Navigation);
}

impl<F> Navigator for F
where
    F: Fn(Navigation) + Send + Sync + 'static,
{
    fn navigate(&self, to: Navigation) {
        self(to);
    }
}
