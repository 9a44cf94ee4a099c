use super::*;
use uuid::Uuid;

fn signed_in() -> UserState {
    UserState { id: Some(Uuid::new_v4()), email: Some("a@x.com".into()), ..UserState::default() }
}

// =============================================================================
// match_route
// =============================================================================

#[test]
fn match_route_exact_paths() {
    assert_eq!(match_route("/").unwrap().pattern, "/");
    assert_eq!(match_route("/chat").unwrap().pattern, "/chat");
    assert_eq!(match_route("/mi-perfil/editar").unwrap().pattern, "/mi-perfil/editar");
}

#[test]
fn match_route_dynamic_segment() {
    let route = match_route("/miembro/42").unwrap();
    assert_eq!(route.pattern, "/miembro/:id");
    assert!(route.requires_login);
}

#[test]
fn match_route_dynamic_segment_must_be_non_empty() {
    assert!(match_route("/miembro/").is_none());
}

#[test]
fn match_route_ignores_trailing_slash() {
    assert_eq!(match_route("/aperturas/").unwrap().pattern, "/aperturas");
}

#[test]
fn match_route_ignores_query_and_fragment() {
    assert_eq!(match_route("/chat?tab=1").unwrap().pattern, "/chat");
    assert_eq!(match_route("/mi-perfil#avatar").unwrap().pattern, "/mi-perfil");
    assert_eq!(match_route("/miembro/42?from=lista#top").unwrap().pattern, "/miembro/:id");
    assert_eq!(match_route("/?next=/chat").unwrap().pattern, "/");
}

#[test]
fn match_route_is_case_insensitive() {
    assert_eq!(match_route("/CHAT").unwrap().pattern, "/chat");
    assert_eq!(match_route("/Mi-Perfil/Editar").unwrap().pattern, "/mi-perfil/editar");
}

#[test]
fn match_route_unknown_path() {
    assert!(match_route("/torneos").is_none());
    assert!(match_route("/miembro/42/partidas").is_none());
}

// =============================================================================
// redirect_for
// =============================================================================

#[test]
fn anonymous_user_is_sent_to_login_from_protected_views() {
    let anon = UserState::anonymous();
    for path in ["/aperturas", "/chat", "/mi-perfil", "/mi-perfil/editar", "/miembros", "/miembro/7", "/publicaciones"] {
        assert_eq!(redirect_for(path, &anon), Some(LOGIN_PATH), "{path}");
    }
}

#[test]
fn anonymous_user_cannot_sneak_past_with_query_fragment_or_case() {
    let anon = UserState::anonymous();
    for path in ["/chat?tab=1", "/CHAT", "/mi-perfil#x", "/Aperturas/", "/miembro/7?x=1"] {
        assert_eq!(redirect_for(path, &anon), Some(LOGIN_PATH), "{path}");
    }
}

#[test]
fn signed_in_user_is_sent_away_from_login_with_query() {
    assert_eq!(redirect_for("/Ingresar?next=/chat", &signed_in()), Some(PROFILE_PATH));
}

#[test]
fn anonymous_user_reaches_public_views() {
    let anon = UserState::anonymous();
    for path in ["/", LOGIN_PATH, REGISTER_PATH, "/torneos"] {
        assert_eq!(redirect_for(path, &anon), None, "{path}");
    }
}

#[test]
fn signed_in_user_is_sent_away_from_login_and_register() {
    let user = signed_in();
    assert_eq!(redirect_for(LOGIN_PATH, &user), Some(PROFILE_PATH));
    assert_eq!(redirect_for(REGISTER_PATH, &user), Some(PROFILE_PATH));
}

#[test]
fn signed_in_user_reaches_protected_views() {
    let user = signed_in();
    for route in ROUTES.iter().filter(|r| r.requires_login) {
        let path = route.pattern.replace(":id", "abc");
        assert_eq!(redirect_for(&path, &user), None, "{path}");
    }
    assert_eq!(redirect_for("/", &user), None);
}

#[test]
fn guard_only_looks_at_identity() {
    let profile_only = UserState { display_name: Some("Ana".into()), ..UserState::default() };
    assert_eq!(redirect_for("/chat", &profile_only), Some(LOGIN_PATH));
}
