//! Navigation guard — which views need a signed-in user.
//!
//! Consumes the coordinator's state; the redirect policy is not part of the
//! coordinator itself. Patterns use `:name` for a single dynamic segment.
//! Matching ignores the query string and fragment, and static segments
//! compare case-insensitively.

use serde::Serialize;

use crate::user::UserState;

pub const LOGIN_PATH: &str = "/ingresar";
pub const REGISTER_PATH: &str = "/crear-cuenta";
pub const PROFILE_PATH: &str = "/mi-perfil";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Route {
    pub pattern: &'static str,
    pub requires_login: bool,
}

const fn public(pattern: &'static str) -> Route {
    Route { pattern, requires_login: false }
}

const fn protected(pattern: &'static str) -> Route {
    Route { pattern, requires_login: true }
}

pub const ROUTES: &[Route] = &[
    public("/"),
    public(LOGIN_PATH),
    public(REGISTER_PATH),
    protected("/aperturas"),
    protected("/chat"),
    protected(PROFILE_PATH),
    protected("/mi-perfil/editar"),
    protected("/miembros"),
    protected("/miembro/:id"),
    protected("/publicaciones"),
];

/// Find the route a concrete path belongs to.
#[must_use]
pub fn match_route(path: &str) -> Option<&'static Route> {
    let path = strip_suffixes(path);
    ROUTES.iter().find(|route| pattern_matches(route.pattern, path))
}

/// Everything before the first `?` or `#`.
fn strip_suffixes(path: &str) -> &str {
    path.find(['?', '#']).map_or(path, |end| &path[..end])
}

fn pattern_matches(pattern: &str, path: &str) -> bool {
    let pattern_segments = pattern.trim_end_matches('/').split('/');
    let path_segments = path.trim_end_matches('/').split('/');
    if pattern_segments.clone().count() != path_segments.clone().count() {
        return false;
    }
    pattern_segments
        .zip(path_segments)
        .all(|(expected, actual)| {
            if expected.starts_with(':') { !actual.is_empty() } else { expected.eq_ignore_ascii_case(actual) }
        })
}

/// Where to send the user instead of `path`, or `None` to let them through.
///
/// - protected view while anonymous: login
/// - login or register view while signed in: own profile
#[must_use]
pub fn redirect_for(path: &str, user: &UserState) -> Option<&'static str> {
    let route = match_route(path);
    let requires_login = route.is_some_and(|r| r.requires_login);

    if requires_login && !user.is_authenticated() {
        return Some(LOGIN_PATH);
    }

    let is_entry_view = route.is_some_and(|r| r.pattern == LOGIN_PATH || r.pattern == REGISTER_PATH);
    if is_entry_view && user.is_authenticated() {
        return Some(PROFILE_PATH);
    }

    None
}

#[cfg(test)]
#[path = "guard_test.rs"]
mod tests;
