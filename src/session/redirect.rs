//! Pending-redirect path rules.

/// Where navigation resumes when nothing else was recorded.
pub const DEFAULT_REDIRECT: &str = "/";

/// Whether `path` may be stored as a pending redirect.
///
/// Auth pages (`/login`, `/register`, anything under `/auth`) are refused so a
/// completed sign-in can never bounce back into the sign-in flow. Only
/// same-origin relative paths are accepted.
#[must_use]
pub fn is_allowed_redirect(path: &str) -> bool {
    if !path.starts_with('/') || path.starts_with("//") || path.contains('\\') {
        return false;
    }
    let route = route_part(path);
    !(route == "/login" || route == "/register" || route == "/auth" || route.starts_with("/auth/"))
}

/// The path without query string or fragment, without a trailing slash.
fn route_part(path: &str) -> &str {
    let end = path.find(['?', '#']).unwrap_or(path.len());
    let route = &path[..end];
    if route.len() > 1 {
        route.trim_end_matches('/')
    } else {
        route
    }
}
